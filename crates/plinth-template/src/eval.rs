/*
 * eval.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! Dotted-path expression evaluation.
//!
//! An expression is a literal (`"text"`, `42`, `true`), a root name, or a
//! dotted path `base.m1.m2`. The base resolves against the binding context;
//! each following segment goes through the capability tables. Resolution
//! never fails: an unknown root name is tried as a zero-argument function
//! call and otherwise yields nil, and nil swallows the rest of the path.

use crate::capability;
use crate::context::Context;
use crate::functions;
use crate::value::Value;

/// Evaluate an expression against the context.
pub fn eval_expr(expr: &str, ctx: &Context) -> Value {
    let expr = expr.trim();
    if expr.is_empty() {
        return Value::Nil;
    }

    if let Some(lit) = literal(expr) {
        return lit;
    }

    // `.` is the current loop element; `.prop` walks from it.
    if expr == "." {
        return ctx.get(".").cloned().unwrap_or(Value::Nil);
    }
    if let Some(rest) = expr.strip_prefix('.') {
        let base = ctx.get(".").cloned().unwrap_or(Value::Nil);
        return walk_path(base, rest.split('.'));
    }

    let mut segments = expr.split('.');
    let head = segments.next().unwrap_or(expr);

    let base = match ctx.get(head) {
        Some(v) => v.clone(),
        // Not a bound name: try it as a zero-argument function before
        // defaulting to nil.
        None => match functions::call(head, &[]) {
            Some(v) => v,
            None => {
                tracing::trace!(name = head, "unknown root name");
                return Value::Nil;
            }
        },
    };

    walk_path(base, segments)
}

/// Classify a literal expression: quoted string, boolean, or integer.
fn literal(expr: &str) -> Option<Value> {
    if (expr.starts_with('"') && expr.ends_with('"') && expr.len() >= 2)
        || (expr.starts_with('\'') && expr.ends_with('\'') && expr.len() >= 2)
    {
        return Some(Value::Str(expr[1..expr.len() - 1].to_string()));
    }
    match expr {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }
    expr.parse::<i64>().ok().map(Value::Int)
}

fn walk_path<'a>(mut value: Value, segments: impl Iterator<Item = &'a str>) -> Value {
    for segment in segments {
        if matches!(value, Value::Nil) {
            return Value::Nil;
        }
        value = capability::call_method(&value, segment.trim());
    }
    value
}
