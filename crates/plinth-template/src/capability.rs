/*
 * capability.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Capability tables: per-type method allow-lists.
//!
//! Instead of reflection, each opaque object type has a closed table mapping
//! method names to accessors. A method missing from the table (or a method
//! lookup on a non-object value) resolves to nil; it never raises. The tables
//! are built once and read-only afterwards, so concurrent renders share them
//! without locking.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{MenuEntry, Object, Page, Site, SiteConfig};
use crate::value::Value;

type PageAccessor = fn(&Page) -> Value;
type SiteAccessor = fn(&Site) -> Value;
type MenuAccessor = fn(&MenuEntry) -> Value;
type ConfigAccessor = fn(&SiteConfig) -> Value;

/// Words-per-minute assumed by the `reading_time` accessor.
const READING_WPM: usize = 200;

static PAGE_METHODS: Lazy<HashMap<&'static str, PageAccessor>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, PageAccessor> = HashMap::new();
    m.insert("title", |p| Value::Str(p.title.clone()));
    m.insert("url", |p| Value::Str(p.url.clone()));
    m.insert("slug", |p| Value::Str(p.slug.clone()));
    m.insert("date", |p| match p.date {
        Some(d) => Value::Date(d),
        None => Value::Nil,
    });
    m.insert("tags", |p| {
        Value::List(p.tags.iter().cloned().map(Value::Str).collect())
    });
    m.insert("summary", |p| Value::Str(p.summary.clone()));
    m.insert("body", |p| Value::Str(p.body.clone()));
    m.insert("content", |p| Value::Str(p.body.clone()));
    m.insert("draft", |p| Value::Bool(p.draft));
    m.insert("word_count", |p| Value::Int(p.word_count as i64));
    m.insert("reading_time", |p| {
        Value::Int(p.word_count.div_ceil(READING_WPM).max(1) as i64)
    });
    m
});

static SITE_METHODS: Lazy<HashMap<&'static str, SiteAccessor>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, SiteAccessor> = HashMap::new();
    m.insert("title", |s| Value::Str(s.title.clone()));
    m.insert("base_url", |s| Value::Str(s.base_url.clone()));
    m.insert("author", |s| Value::Str(s.author.clone()));
    m.insert("description", |s| Value::Str(s.description.clone()));
    m.insert("pages", |s| {
        Value::List(
            s.pages
                .iter()
                .map(|p| Value::Object(Object::Page(Arc::clone(p))))
                .collect(),
        )
    });
    m.insert("tags", |s| {
        Value::List(s.tags.iter().cloned().map(Value::Str).collect())
    });
    m.insert("build_time", |s| match s.build_time {
        Some(d) => Value::Date(d),
        None => Value::Nil,
    });
    m
});

static MENU_METHODS: Lazy<HashMap<&'static str, MenuAccessor>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, MenuAccessor> = HashMap::new();
    m.insert("name", |e| Value::Str(e.name.clone()));
    // Themes written against page lists use .title on menu entries too.
    m.insert("title", |e| Value::Str(e.name.clone()));
    m.insert("url", |e| Value::Str(e.url.clone()));
    m.insert("weight", |e| Value::Int(e.weight));
    m.insert("external", |e| Value::Bool(e.external));
    m.insert("children", |e| {
        Value::List(
            e.children
                .iter()
                .map(|c| Value::Object(Object::MenuEntry(Arc::new(c.clone()))))
                .collect(),
        )
    });
    m.insert("has_children", |e| Value::Bool(!e.children.is_empty()));
    m
});

static CONFIG_METHODS: Lazy<HashMap<&'static str, ConfigAccessor>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, ConfigAccessor> = HashMap::new();
    m.insert("theme", |c| Value::Str(c.theme.clone()));
    m.insert("language", |c| Value::Str(c.language.clone()));
    m.insert("author", |c| Value::Str(c.author.clone()));
    m.insert("page_size", |c| Value::Int(c.page_size));
    m
});

/// Invoke an allow-listed method on a value.
///
/// Returns nil when the value is not an object or the method is not in the
/// receiving type's table; nil then propagates through the rest of the
/// dotted path.
pub fn call_method(value: &Value, method: &str) -> Value {
    let Value::Object(obj) = value else {
        return Value::Nil;
    };
    let result = match obj {
        Object::Page(p) => PAGE_METHODS.get(method).map(|f| f(p)),
        Object::Site(s) => SITE_METHODS.get(method).map(|f| f(s)),
        Object::MenuEntry(e) => MENU_METHODS.get(method).map(|f| f(e)),
        Object::Config(c) => CONFIG_METHODS.get(method).map(|f| f(c)),
    };
    match result {
        Some(v) => v,
        None => {
            tracing::trace!(kind = obj.kind(), method, "method not allow-listed");
            Value::Nil
        }
    }
}
