/*
 * functions.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The function call processor and its process-wide registry.
//!
//! `{{ name(arg1, arg2) }}` spans dispatch by name against a registry of pure
//! transformations built once at startup. The registry operates on primitive
//! values only: evaluated arguments that are objects or sequences are coerced
//! to a representative string first (lossy by design, kept for theme
//! compatibility). An unknown function name renders as empty output.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;

use crate::context::Context;
use crate::eval::eval_expr;
use crate::filters::slugify_str;
use crate::value::{DATE_FORMAT, Value};

/// A registered template function.
pub type NativeFn = fn(&[Value]) -> Value;

/// `{{ name(args) }}` — the argument list cannot contain nested calls.
static CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\(([^(){}]*)\)\s*\}\}")
        .expect("call regex is valid")
});

/// Upper bound honored by `repeat` so a template typo cannot balloon output.
const MAX_REPEAT: i64 = 10_000;

static REGISTRY: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, NativeFn> = HashMap::new();
    m.insert("upper", |a| Value::Str(arg_text(a, 0).to_uppercase()));
    m.insert("lower", |a| Value::Str(arg_text(a, 0).to_lowercase()));
    m.insert("title", |a| Value::Str(title_case(&arg_text(a, 0))));
    m.insert("trim", |a| Value::Str(arg_text(a, 0).trim().to_string()));
    m.insert("replace", |a| {
        Value::Str(arg_text(a, 0).replace(&arg_text(a, 1), &arg_text(a, 2)))
    });
    m.insert("slugify", |a| Value::Str(slugify_str(&arg_text(a, 0))));
    m.insert("repeat", |a| match arg_int(a, 1) {
        Some(n) => Value::Str(arg_text(a, 0).repeat(n.clamp(0, MAX_REPEAT) as usize)),
        None => Value::Nil,
    });
    m.insert("add", |a| int_op(a, |x, y| x.checked_add(y)));
    m.insert("sub", |a| int_op(a, |x, y| x.checked_sub(y)));
    m.insert("mul", |a| int_op(a, |x, y| x.checked_mul(y)));
    m.insert("min", |a| int_op(a, |x, y| Some(x.min(y))));
    m.insert("max", |a| int_op(a, |x, y| Some(x.max(y))));
    m.insert("len", |a| Value::Int(arg_text(a, 0).chars().count() as i64));
    m.insert("contains", |a| {
        Value::Bool(arg_text(a, 0).contains(&arg_text(a, 1)))
    });
    m.insert("default", |a| {
        let first = a.first().cloned().unwrap_or(Value::Nil);
        if first.is_truthy() {
            first
        } else {
            a.get(1).cloned().unwrap_or(Value::Nil)
        }
    });
    m.insert("year", |_| Value::Int(i64::from(chrono::Local::now().year())));
    m.insert("now", |_| {
        Value::Str(chrono::Local::now().format(DATE_FORMAT).to_string())
    });
    m
});

/// Call a registered function. `None` means the name is not registered.
pub fn call(name: &str, args: &[Value]) -> Option<Value> {
    REGISTRY.get(name).map(|f| f(args))
}

/// Replace every `{{ name(args) }}` span in the text.
///
/// Runs before loop and conditional processing so calls nested inside those
/// constructs resolve first. Unknown names produce empty output.
pub(crate) fn process_calls<'a>(text: &'a str, ctx: &Context) -> Cow<'a, str> {
    CALL_RE.replace_all(text, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let args = parse_args(&caps[2], ctx);
        match call(name, &args) {
            Some(result) => result.render(),
            None => {
                tracing::debug!(name, "unknown function");
                String::new()
            }
        }
    })
}

/// Parse a comma-separated argument list.
///
/// Each argument is trimmed and classified: quoted text is a string, `true`
/// and `false` are booleans, a parseable integer is an integer, and anything
/// else evaluates as an expression and is coerced to a primitive.
pub(crate) fn parse_args(raw: &str, ctx: &Context) -> Vec<Value> {
    if raw.trim().is_empty() {
        return Vec::new();
    }
    split_outside_quotes(raw, ',')
        .iter()
        .map(|piece| classify_arg(piece.trim(), ctx))
        .collect()
}

fn classify_arg(piece: &str, ctx: &Context) -> Value {
    if (piece.starts_with('"') && piece.ends_with('"') && piece.len() >= 2)
        || (piece.starts_with('\'') && piece.ends_with('\'') && piece.len() >= 2)
    {
        return Value::Str(piece[1..piece.len() - 1].to_string());
    }
    match piece {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = piece.parse::<i64>() {
        return Value::Int(n);
    }
    coerce_arg(eval_expr(piece, ctx))
}

/// Collapse non-primitive values to a representative primitive.
///
/// Objects contribute their title/name; sequences contribute their rendered
/// join; timestamps contribute their formatted text.
pub(crate) fn coerce_arg(value: Value) -> Value {
    match value {
        Value::Object(_) | Value::List(_) | Value::Date(_) => Value::Str(value.render()),
        primitive => primitive,
    }
}

/// Split on `sep`, ignoring separators inside single or double quotes.
pub(crate) fn split_outside_quotes(raw: &str, sep: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for ch in raw.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                current.push(ch);
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch == sep => {
                pieces.push(std::mem::take(&mut current));
            }
            None => current.push(ch),
        }
    }
    pieces.push(current);
    pieces
}

fn arg_text(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::render).unwrap_or_default()
}

fn arg_int(args: &[Value], index: usize) -> Option<i64> {
    match args.get(index) {
        Some(Value::Int(n)) => Some(*n),
        Some(Value::Str(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

fn int_op(args: &[Value], op: fn(i64, i64) -> Option<i64>) -> Value {
    match (arg_int(args, 0), arg_int(args, 1)) {
        (Some(x), Some(y)) => op(x, y).map(Value::Int).unwrap_or(Value::Nil),
        _ => Value::Nil,
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Object, Page};
    use std::sync::Arc;

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("name", Value::Str("alice".to_string()));
        ctx.insert(
            "page",
            Value::Object(Object::Page(Arc::new(Page {
                title: "A Post".to_string(),
                ..Page::default()
            }))),
        );
        ctx
    }

    #[test]
    fn test_process_simple_call() {
        assert_eq!(process_calls("{{ upper(\"abc\") }}", &ctx()), "ABC");
        assert_eq!(process_calls("x {{ add(1, 2) }} y", &ctx()), "x 3 y");
    }

    #[test]
    fn test_unknown_function_is_empty() {
        assert_eq!(process_calls("{{ unknown_fn(1,2) }}", &ctx()), "");
        assert_eq!(process_calls("a{{ nope() }}b", &ctx()), "ab");
    }

    #[test]
    fn test_argument_classification() {
        let args = parse_args("\"quoted\", true, 7, name", &ctx());
        assert_eq!(
            args,
            vec![
                Value::Str("quoted".to_string()),
                Value::Bool(true),
                Value::Int(7),
                Value::Str("alice".to_string()),
            ]
        );
    }

    #[test]
    fn test_object_argument_coerces_to_title() {
        let args = parse_args("page", &ctx());
        assert_eq!(args, vec![Value::Str("A Post".to_string())]);
    }

    #[test]
    fn test_quoted_comma_stays_in_one_argument() {
        let args = parse_args("\"a, b\", 1", &ctx());
        assert_eq!(
            args,
            vec![Value::Str("a, b".to_string()), Value::Int(1)]
        );
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(process_calls("{{ lower(\"ABC\") }}", &ctx()), "abc");
        assert_eq!(process_calls("{{ title(\"hello world\") }}", &ctx()), "Hello World");
        assert_eq!(process_calls("{{ trim(\"  x  \") }}", &ctx()), "x");
        assert_eq!(
            process_calls("{{ replace(\"a-b\", \"-\", \"_\") }}", &ctx()),
            "a_b"
        );
        assert_eq!(process_calls("{{ slugify(\"Hello World!\") }}", &ctx()), "hello-world");
        assert_eq!(process_calls("{{ repeat(\"ab\", 3) }}", &ctx()), "ababab");
        assert_eq!(process_calls("{{ len(\"abcd\") }}", &ctx()), "4");
        assert_eq!(
            process_calls("{{ contains(\"haystack\", \"st\") }}", &ctx()),
            "true"
        );
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(process_calls("{{ sub(5, 2) }}", &ctx()), "3");
        assert_eq!(process_calls("{{ mul(4, 3) }}", &ctx()), "12");
        assert_eq!(process_calls("{{ min(4, 3) }}", &ctx()), "3");
        assert_eq!(process_calls("{{ max(4, 3) }}", &ctx()), "4");
        // Type mismatch degrades to empty output, never an error.
        assert_eq!(process_calls("{{ add(\"x\", 2) }}", &ctx()), "");
    }

    #[test]
    fn test_default_function() {
        assert_eq!(
            process_calls("{{ default(missing, \"fallback\") }}", &ctx()),
            "fallback"
        );
        assert_eq!(
            process_calls("{{ default(name, \"fallback\") }}", &ctx()),
            "alice"
        );
    }

    #[test]
    fn test_calls_inside_surrounding_text() {
        assert_eq!(
            process_calls("<b>{{ upper(name) }}</b> and {{ len(name) }}", &ctx()),
            "<b>ALICE</b> and 5"
        );
    }
}
