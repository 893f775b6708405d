/*
 * error.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Error types for rendering.
//!
//! Almost nothing in this crate can fail: malformed directives, unknown
//! names, and bad arguments all degrade to empty output by design. The one
//! condition a caller must hear about is a layout name that resolves to no
//! template at all, so it can fall back to a built-in default render.

use thiserror::Error;

/// Errors surfaced by rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// No layout candidate answered to the requested name.
    #[error("no layout found for {name:?}")]
    NoLayout { name: String },
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
