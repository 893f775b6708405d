/*
 * model.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Data objects the template language can reach.
//!
//! These are the opaque object types behind [`crate::Value::Object`]. The
//! content layer builds them (from markdown, front matter, and site config)
//! and hands them in through the binding context; templates can only touch
//! the accessors allow-listed in [`crate::capability`].
//!
//! Payloads are reference counted so cloning a `Value` during loop iteration
//! stays cheap.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single piece of content: a post, an article, a standalone page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub title: String,
    pub url: String,
    pub slug: String,
    pub date: Option<DateTime<FixedOffset>>,
    pub tags: Vec<String>,
    pub summary: String,
    /// Rendered body HTML. Produced by the markdown layer, opaque here.
    pub body: String,
    pub draft: bool,
    pub word_count: usize,
}

/// The whole site as seen from templates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Site {
    pub title: String,
    pub base_url: String,
    pub author: String,
    pub description: String,
    pub pages: Vec<Arc<Page>>,
    pub tags: Vec<String>,
    pub build_time: Option<DateTime<FixedOffset>>,
}

/// One entry in a navigation menu.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MenuEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub weight: i64,
    #[serde(default)]
    pub external: bool,
    #[serde(default)]
    pub children: Vec<MenuEntry>,
}

/// Site-level configuration exposed to themes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub author: String,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_theme() -> String {
    "default".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_page_size() -> i64 {
    10
}

impl Default for SiteConfig {
    fn default() -> Self {
        SiteConfig {
            theme: default_theme(),
            language: default_language(),
            author: String::new(),
            page_size: default_page_size(),
        }
    }
}

/// An opaque object reference.
///
/// This is a closed set: templates cannot reach arbitrary host types, only
/// the object kinds enumerated here, and on those only the methods their
/// capability table allows.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Page(Arc<Page>),
    Site(Arc<Site>),
    MenuEntry(Arc<MenuEntry>),
    Config(Arc<SiteConfig>),
}

impl Object {
    /// The kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Object::Page(_) => "page",
            Object::Site(_) => "site",
            Object::MenuEntry(_) => "menu_entry",
            Object::Config(_) => "config",
        }
    }

    /// The representative field used when an object must collapse to text:
    /// title for pages and sites, name for menu entries, theme for config.
    pub fn representative(&self) -> String {
        match self {
            Object::Page(p) => p.title.clone(),
            Object::Site(s) => s.title.clone(),
            Object::MenuEntry(m) => m.name.clone(),
            Object::Config(c) => c.theme.clone(),
        }
    }
}
