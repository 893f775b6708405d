/*
 * resolver.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Layout resolution.
//!
//! The engine never touches theme directories directly: a [`LayoutResolver`]
//! maps a logical layout name (plus a page-kind/output-format hint) to
//! template text. For a name `single` with kind `post` and format `html`,
//! the naming-convention candidates are tried in order:
//!
//! 1. `post/single.html`
//! 2. `single.html`
//! 3. `_default/single.html`
//!
//! A name that already carries an extension is used as-is instead of taking
//! the hint's format.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Page kind and output format used to pick among layout candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutHint {
    /// Page kind, e.g. `post`, `section`. `None` skips the kind candidate.
    pub kind: Option<String>,
    /// Output format extension, e.g. `html`, `xml`.
    pub format: String,
}

impl LayoutHint {
    pub fn new(kind: Option<&str>, format: &str) -> Self {
        LayoutHint {
            kind: kind.map(str::to_string),
            format: format.to_string(),
        }
    }
}

impl Default for LayoutHint {
    fn default() -> Self {
        LayoutHint {
            kind: None,
            format: "html".to_string(),
        }
    }
}

/// Trait for resolving logical layout names to template text.
pub trait LayoutResolver {
    /// Return the winning template text for `name`, or `None` when no
    /// candidate exists.
    fn resolve(&self, name: &str, hint: &LayoutHint) -> Option<String>;
}

/// The candidate keys tried for a layout name, most specific first.
pub fn layout_candidates(name: &str, hint: &LayoutHint) -> Vec<String> {
    let file = if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{name}.{}", hint.format)
    };
    let mut candidates = Vec::with_capacity(3);
    if let Some(kind) = &hint.kind {
        candidates.push(format!("{kind}/{file}"));
    }
    candidates.push(file.clone());
    candidates.push(format!("_default/{file}"));
    candidates
}

/// Resolver backed by an in-memory map.
///
/// Keys are candidate-form paths (`post/single.html`, `_default/base.html`).
/// Useful for tests and for themes bundled into the binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryLayouts {
    layouts: HashMap<String, String>,
}

impl MemoryLayouts {
    /// Create a new empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layout under a candidate-form key.
    pub fn add(&mut self, key: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.layouts.insert(key.into(), content.into());
        self
    }

    /// Create a resolver with the given layouts.
    pub fn with_layouts(
        layouts: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (key, content) in layouts {
            resolver.add(key, content);
        }
        resolver
    }
}

impl LayoutResolver for MemoryLayouts {
    fn resolve(&self, name: &str, hint: &LayoutHint) -> Option<String> {
        for candidate in layout_candidates(name, hint) {
            if let Some(text) = self.layouts.get(&candidate) {
                tracing::debug!(name, candidate, "layout resolved");
                return Some(text.clone());
            }
        }
        // Direct key as a last resort, so extensionless keys still work.
        self.layouts.get(name).cloned()
    }
}

/// Resolver that reads layouts from a theme directory.
#[derive(Debug, Clone)]
pub struct DirLayouts {
    root: PathBuf,
}

impl DirLayouts {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirLayouts { root: root.into() }
    }
}

impl LayoutResolver for DirLayouts {
    fn resolve(&self, name: &str, hint: &LayoutHint) -> Option<String> {
        for candidate in layout_candidates(name, hint) {
            let path = self.root.join(&candidate);
            if let Ok(text) = std::fs::read_to_string(&path) {
                tracing::debug!(name, path = %path.display(), "layout resolved");
                return Some(text);
            }
        }
        None
    }
}

/// Resolver that never finds anything (for rendering without a theme).
#[derive(Debug, Clone, Default)]
pub struct NoLayouts;

impl LayoutResolver for NoLayouts {
    fn resolve(&self, _name: &str, _hint: &LayoutHint) -> Option<String> {
        None
    }
}
