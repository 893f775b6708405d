/*
 * context.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The binding context: chained name→value scopes.
//!
//! Loop iteration layers a fresh child scope over the enclosing one, so
//! loop-local bindings (`.`, `$index`, a named loop variable) shadow page and
//! site globals without mutating them. A context lives for one render call.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Object, Page, Site};
use crate::value::Value;

/// An ordered chain of variable scopes.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Bindings at this level.
    variables: HashMap<String, Value>,

    /// Enclosing scope, if any.
    parent: Option<Box<Context>>,
}

impl Context {
    /// Create a new empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the conventional root context for rendering one page:
    /// `site`, `page`, and `now` are bound.
    pub fn for_page(site: Arc<Site>, page: Arc<Page>) -> Self {
        let mut ctx = Context::new();
        let now = chrono::Local::now().fixed_offset();
        ctx.insert("site", Value::Object(Object::Site(site)));
        ctx.insert("page", Value::Object(Object::Page(page)));
        ctx.insert("now", Value::Date(now));
        ctx
    }

    /// Bind a name in this scope, shadowing any outer binding.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    /// Look a name up, walking outward through enclosing scopes.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.variables
            .get(key)
            .or_else(|| self.parent.as_ref().and_then(|p| p.get(key)))
    }

    /// Create a child scope layered over this one.
    pub fn child(&self) -> Context {
        Context {
            variables: HashMap::new(),
            parent: Some(Box::new(self.clone())),
        }
    }
}
