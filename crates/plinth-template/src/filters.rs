/*
 * filters.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The filter pipeline: `{{ expr | filter1 | filter2(arg) }}`.
//!
//! The evaluated expression threads through each filter left to right.
//! String filters act on string values and pass anything else through
//! untouched; sequence filters do the reverse. An unknown filter name passes
//! the value through unchanged. Filters with arguments reuse the function
//! call argument parsing.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use regex::Regex;
use std::collections::HashMap;

use crate::context::Context;
use crate::functions::{parse_args, split_outside_quotes};
use crate::value::Value;

/// A registered filter: value in, value out.
pub type FilterFn = fn(Value, &[Value]) -> Value;

/// Output budget used by `truncate` when no length argument is given.
const TRUNCATE_DEFAULT: i64 = 100;

const ELLIPSIS: &str = "...";

/// `name` or `name(args)`; names may end in `?` for the existential checks.
static FILTER_SEG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*\??)\s*(?:\((.*)\))?$").expect("filter regex is valid")
});

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex is valid"));

static FILTERS: Lazy<HashMap<&'static str, FilterFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, FilterFn> = HashMap::new();
    m.insert("upper", |v, _| map_str(v, |s| s.to_uppercase()));
    m.insert("upcase", |v, _| map_str(v, |s| s.to_uppercase()));
    m.insert("lower", |v, _| map_str(v, |s| s.to_lowercase()));
    m.insert("downcase", |v, _| map_str(v, |s| s.to_lowercase()));
    m.insert("capitalize", |v, _| map_str(v, |s| capitalize(&s)));
    m.insert("slug", |v, _| map_str(v, |s| slugify_str(&s)));
    m.insert("slugify", |v, _| map_str(v, |s| slugify_str(&s)));
    m.insert("strip", |v, _| map_str(v, |s| s.trim().to_string()));
    m.insert("trim", |v, _| map_str(v, |s| s.trim().to_string()));
    m.insert("strip_tags", |v, _| {
        map_str(v, |s| TAG_RE.replace_all(&s, "").into_owned())
    });
    m.insert("escape", |v, _| map_str(v, |s| escape_str(&s)));
    m.insert("truncate", filter_truncate);
    m.insert("first", |v, _| match v {
        Value::List(items) => items.into_iter().next().unwrap_or(Value::Nil),
        Value::Str(s) => s.chars().next().map(|c| Value::Str(c.to_string())).unwrap_or(Value::Nil),
        other => other,
    });
    m.insert("last", |v, _| match v {
        Value::List(items) => items.into_iter().next_back().unwrap_or(Value::Nil),
        Value::Str(s) => s.chars().next_back().map(|c| Value::Str(c.to_string())).unwrap_or(Value::Nil),
        other => other,
    });
    m.insert("size", |v, _| match v {
        Value::List(items) => Value::Int(items.len() as i64),
        Value::Str(s) => Value::Int(s.chars().count() as i64),
        Value::Nil => Value::Int(0),
        other => other,
    });
    m.insert("join", |v, args| match v {
        Value::List(items) => {
            let sep = match args.first() {
                Some(s) => s.render(),
                None => ", ".to_string(),
            };
            Value::Str(items.iter().map(Value::render).collect::<Vec<_>>().join(&sep))
        }
        other => other,
    });
    m.insert("reverse", |v, _| match v {
        Value::List(mut items) => {
            items.reverse();
            Value::List(items)
        }
        Value::Str(s) => Value::Str(s.chars().rev().collect()),
        other => other,
    });
    m.insert("sort", |v, _| match v {
        Value::List(mut items) => {
            items.sort_by_key(|a| a.render());
            Value::List(items)
        }
        other => other,
    });
    m.insert("uniq", |v, _| match v {
        Value::List(items) => {
            let mut seen = Vec::new();
            let mut kept = Vec::new();
            for item in items {
                let key = item.render();
                if !seen.contains(&key) {
                    seen.push(key);
                    kept.push(item);
                }
            }
            Value::List(kept)
        }
        other => other,
    });
    m.insert("sample", |v, _| match v {
        Value::List(items) => items
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or(Value::Nil),
        other => other,
    });
    m.insert("shuffle", |v, _| match v {
        Value::List(mut items) => {
            items.shuffle(&mut rand::thread_rng());
            Value::List(items)
        }
        other => other,
    });
    m.insert("compact", |v, _| match v {
        Value::List(items) => Value::List(
            items
                .into_iter()
                .filter(|item| !matches!(item, Value::Nil))
                .collect(),
        ),
        other => other,
    });
    m.insert("any?", |v, _| {
        Value::Bool(as_elements(v).iter().any(Value::is_truthy))
    });
    m.insert("all?", |v, _| {
        Value::Bool(as_elements(v).iter().all(Value::is_truthy))
    });
    m.insert("none?", |v, _| {
        Value::Bool(!as_elements(v).iter().any(Value::is_truthy))
    });
    m.insert("one?", |v, _| {
        Value::Bool(as_elements(v).iter().filter(|e| e.is_truthy()).count() == 1)
    });
    m.insert("clamp", filter_clamp);
    m
});

/// Thread a value through a filter chain, left to right.
pub(crate) fn apply_pipeline(mut value: Value, segments: &[String], ctx: &Context) -> Value {
    for segment in segments {
        value = apply_one(value, segment.trim(), ctx);
    }
    value
}

/// Split the text of a variable span on `|`, honoring quotes.
/// The first piece is the expression, the rest are filter segments.
pub(crate) fn split_pipeline(raw: &str) -> Vec<String> {
    split_outside_quotes(raw, '|')
}

fn apply_one(value: Value, segment: &str, ctx: &Context) -> Value {
    let Some(caps) = FILTER_SEG_RE.captures(segment) else {
        tracing::trace!(segment, "malformed filter segment");
        return value;
    };
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let args = caps
        .get(2)
        .map(|m| parse_args(m.as_str(), ctx))
        .unwrap_or_default();
    match FILTERS.get(name) {
        Some(f) => f(value, &args),
        None => {
            tracing::trace!(name, "unknown filter");
            value
        }
    }
}

/// Ellipsis truncation. The budget covers the ellipsis itself:
/// `truncate(5)` on `"abcdefghij"` yields `"ab..."`.
fn filter_truncate(value: Value, args: &[Value]) -> Value {
    let budget = match args.first() {
        Some(Value::Int(n)) => *n,
        None => TRUNCATE_DEFAULT,
        Some(_) => return value,
    };
    map_str(value, |s| {
        if s.chars().count() as i64 <= budget {
            return s;
        }
        let keep = (budget - ELLIPSIS.len() as i64).max(0) as usize;
        let mut out: String = s.chars().take(keep).collect();
        out.push_str(ELLIPSIS);
        out
    })
}

/// `clamp(min, max)`, or `clamp(max)` with an implicit minimum of 0.
fn filter_clamp(value: Value, args: &[Value]) -> Value {
    let Value::Int(n) = value else {
        return value;
    };
    let (min, max) = match (args.first(), args.get(1)) {
        (Some(Value::Int(min)), Some(Value::Int(max))) => (*min, *max),
        (Some(Value::Int(max)), None) => (0, *max),
        _ => return Value::Int(n),
    };
    if min > max {
        return Value::Int(n);
    }
    Value::Int(n.clamp(min, max))
}

fn map_str(value: Value, f: impl FnOnce(String) -> String) -> Value {
    match value {
        Value::Str(s) => Value::Str(f(s)),
        other => other,
    }
}

fn as_elements(value: Value) -> Vec<Value> {
    match value {
        Value::List(items) => items,
        Value::Nil => Vec::new(),
        single => vec![single],
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Lowercase, replace runs of non-alphanumerics with a single dash, and trim
/// dashes from both ends.
pub(crate) fn slugify_str(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn escape_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
