/*
 * inherit.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Template inheritance: `{{ extends "name" }}` plus named blocks.
//!
//! A child template declares its parent with `extends` and overrides named
//! `{{ block "X" }}...{{ endblock }}` sections. Composition captures the
//! child's block map, resolves the parent (transitively, when the parent
//! itself extends a grandparent), and splices each override into the parent's
//! matching block, keeping the parent's default content where the child has
//! no override. The composed text then goes through the ordinary render
//! pipeline.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::matcher::match_block;
use crate::resolver::{LayoutHint, LayoutResolver};

/// `{{ extends "name" }}`
static EXTENDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\{\s*extends\s+"([^"{}]+)"\s*\}\}"#).expect("extends regex is valid")
});

/// `{{ block "name" }}`
static BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\{\s*block\s+"([^"{}]+)"\s*\}\}"#).expect("block regex is valid")
});

/// `{{ endblock }}`
static ENDBLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*endblock\s*\}\}").expect("endblock regex is valid"));

/// Cap on `extends` chains, so a layout that extends itself terminates.
const MAX_EXTENDS_DEPTH: usize = 16;

/// Compose a template with its parent chain. Returns the input unchanged
/// when it declares no parent.
pub(crate) fn compose(template: &str, resolver: &dyn LayoutResolver, hint: &LayoutHint) -> String {
    compose_at_depth(template, resolver, hint, 0)
}

fn compose_at_depth(
    template: &str,
    resolver: &dyn LayoutResolver,
    hint: &LayoutHint,
    depth: usize,
) -> String {
    let Some(caps) = EXTENDS_RE.captures(template) else {
        return template.to_string();
    };
    let span = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
    let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    if depth >= MAX_EXTENDS_DEPTH {
        tracing::warn!(name, depth, "extends chain too deep, stopping composition");
        return without_span(template, span);
    }

    let Some(parent) = resolver.resolve(name, hint) else {
        // Parent missing: degrade to rendering the child on its own. The
        // cleanup pass strips the orphaned block markers later.
        tracing::debug!(name, "parent layout not found, rendering child as-is");
        return without_span(template, span);
    };

    let parent = compose_at_depth(&parent, resolver, hint, depth + 1);
    let overrides = extract_blocks(template);
    splice_blocks(&parent, &overrides)
}

fn without_span(text: &str, span: (usize, usize)) -> String {
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..span.0]);
    out.push_str(&text[span.1..]);
    out
}

/// Capture the child's block map: name → override content.
fn extract_blocks(text: &str) -> HashMap<String, String> {
    let mut blocks = HashMap::new();
    let mut cursor = 0;
    while let Some(caps) = BLOCK_RE.captures_at(text, cursor) {
        let (open, name) = match (caps.get(0), caps.get(1)) {
            (Some(open), Some(name)) => (open, name.as_str()),
            _ => break,
        };
        let body = &text[open.end()..];
        let bounds = match_block(body, &BLOCK_RE, None, &ENDBLOCK_RE);
        match bounds.close_span {
            Some((close_start, close_end)) => {
                blocks.insert(name.to_string(), body[..close_start].to_string());
                cursor = open.end() + close_end;
            }
            None => {
                // Unmatched block opener: skip it, cleanup deals with it.
                cursor = open.end();
            }
        }
    }
    blocks
}

/// Replace each parent block with the child's override, or keep the parent's
/// default content. Block markers do not survive composition.
fn splice_blocks(parent: &str, overrides: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(parent.len());
    let mut cursor = 0;
    while let Some(caps) = BLOCK_RE.captures_at(parent, cursor) {
        let (open, name) = match (caps.get(0), caps.get(1)) {
            (Some(open), Some(name)) => (open, name.as_str()),
            _ => break,
        };
        let body = &parent[open.end()..];
        let bounds = match_block(body, &BLOCK_RE, None, &ENDBLOCK_RE);
        let Some((close_start, close_end)) = bounds.close_span else {
            // Unmatched opener in the parent: emit it untouched.
            out.push_str(&parent[cursor..open.end()]);
            cursor = open.end();
            continue;
        };
        out.push_str(&parent[cursor..open.start()]);
        match overrides.get(name) {
            Some(content) => out.push_str(content),
            None => out.push_str(&body[..close_start]),
        }
        cursor = open.end() + close_end;
    }
    out.push_str(&parent[cursor..]);
    out
}
