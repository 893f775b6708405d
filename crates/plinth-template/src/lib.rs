/*
 * lib.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Directive-based template engine for the Plinth static site generator.
//!
//! This crate is the templating core: it recognizes control directives
//! embedded in layout text and evaluates them against the page/site data
//! model. It supports:
//!
//! - Variable interpolation: `{{ expr }}`, with dotted paths (`{{ page.title }}`)
//! - Filter pipelines: `{{ expr | strip | truncate(80) }}`
//! - Function calls: `{{ slugify(page.title) }}`
//! - Conditionals: `{{ if cond }}...{{ else }}...{{ endif }}`
//! - Loops: `{{ for item in expr }}...{{ endfor }}` and
//!   `{{ range expr }}...{{ end }}` (optionally `{{ range $item := expr }}`)
//! - Loop-local bindings: `{{ . }}`, `{{ .field }}`, `{{ $index }}`
//! - Inheritance: `{{ extends "name" }}` with
//!   `{{ block "name" }}default{{ endblock }}` overrides
//!
//! # Architecture
//!
//! There is no parse tree: directives are recognized by regex-driven scans,
//! with a manual depth-counting matcher pairing nested blocks, and selected
//! branches and loop bodies recursively re-enter the pipeline. Object access
//! goes through closed per-type capability tables instead of reflection, so
//! the surface exposed to theme authors stays auditable. Anything malformed
//! or unknown degrades to empty output; the only error a caller ever sees is
//! a layout name that resolves to nothing.
//!
//! The engine is independent of content parsing, asset handling, and the
//! build driver. Those collaborators construct the [`Page`]/[`Site`] objects
//! and supply a [`LayoutResolver`]; this crate returns rendered text.
//!
//! # Example
//!
//! ```
//! use plinth_template::{Context, Renderer, Value};
//!
//! let renderer = Renderer::default();
//!
//! let mut ctx = Context::new();
//! ctx.insert("name", Value::Str("World".to_string()));
//!
//! let output = renderer.render("Hello, {{ name }}!", &ctx);
//! assert_eq!(output, "Hello, World!");
//! ```

pub mod capability;
pub mod context;
pub mod engine;
pub mod error;
pub mod eval;
pub mod filters;
pub mod functions;
mod inherit;
mod matcher;
pub mod model;
pub mod resolver;
pub mod value;

// Re-export main types at crate root
pub use context::Context;
pub use engine::Renderer;
pub use error::{RenderError, RenderResult};
pub use model::{MenuEntry, Object, Page, Site, SiteConfig};
pub use resolver::{DirLayouts, LayoutHint, LayoutResolver, MemoryLayouts, NoLayouts};
pub use value::{DATE_FORMAT, Value};
