/*
 * engine.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The render pipeline.
//!
//! One render call runs, in order: inheritance composition, function calls,
//! loops, conditionals (to a fixed point), variable substitution, and the
//! final cleanup pass. Conditional branches and loop bodies re-enter the
//! pipeline recursively, so arbitrarily nested directives work without a
//! parse tree; recursion depth is bounded by template nesting, and every
//! scan carries an iteration bound so malformed input terminates.
//!
//! Rendering is synchronous and shares no mutable state: the registries and
//! capability tables are read-only statics, and the binding context is local
//! to the call, so renders on separate threads need no locking.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::{RenderError, RenderResult};
use crate::eval::eval_expr;
use crate::filters;
use crate::functions;
use crate::inherit;
use crate::matcher::{
    ELSE_RE, END_RE, ENDFOR_RE, ENDIF_RE, FOR_RE, IF_RE, RANGE_RE, match_block,
};
use crate::resolver::{LayoutHint, LayoutResolver, NoLayouts};
use crate::value::Value;

/// Any remaining directive or substitution span.
static LEFTOVER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("leftover regex is valid"));

/// Attributes emptied out by directive stripping.
static EMPTY_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\s+(?:href|src|class|id|alt|style)=(?:""|'')"#)
        .expect("empty attr regex is valid")
});

/// Whitespace wedged between a closing quote and `>` by stripping.
static GAP_BEFORE_GT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""[ \t]+>"#).expect("gap regex is valid"));

/// Blank-line runs left where directive-only lines were stripped.
static BLANK_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank run regex is valid"));

/// Directive keywords that variable substitution must not treat as
/// expressions. Spans starting with these are unmatched fragments and belong
/// to the cleanup pass.
const KEYWORDS: &[&str] = &[
    "if", "else", "endif", "for", "endfor", "range", "end", "extends", "block", "endblock",
];

/// The template renderer.
///
/// Owns the layout resolver used for `extends` composition and
/// [`render_by_name`](Renderer::render_by_name). Cheap to share behind a
/// reference across build workers.
pub struct Renderer {
    resolver: Box<dyn LayoutResolver>,
}

impl Renderer {
    pub fn new(resolver: Box<dyn LayoutResolver>) -> Self {
        Renderer { resolver }
    }

    /// Render template text against a binding context.
    ///
    /// Never fails: every malformed or unknown construct degrades to
    /// omission.
    pub fn render(&self, template: &str, ctx: &Context) -> String {
        self.render_with_hint(template, &LayoutHint::default(), ctx)
    }

    /// Resolve a layout name, then render it.
    ///
    /// Layout resolution failure is the one error surfaced to the caller, so
    /// it can fall back to a built-in default render.
    pub fn render_by_name(
        &self,
        name: &str,
        hint: &LayoutHint,
        ctx: &Context,
    ) -> RenderResult<String> {
        let Some(template) = self.resolver.resolve(name, hint) else {
            return Err(RenderError::NoLayout {
                name: name.to_string(),
            });
        };
        Ok(self.render_with_hint(&template, hint, ctx))
    }

    fn render_with_hint(&self, template: &str, hint: &LayoutHint, ctx: &Context) -> String {
        let composed = inherit::compose(template, self.resolver.as_ref(), hint);
        let processed = process_fragment(&composed, ctx);
        cleanup(&processed)
    }
}

impl Default for Renderer {
    /// A renderer with no layouts: `extends` degrades to the child template
    /// and `render_by_name` always reports no layout.
    fn default() -> Self {
        Renderer::new(Box::new(NoLayouts))
    }
}

/// One pass of the directive pipeline over a fragment.
///
/// Loop bodies and conditional branches recurse through here; the cleanup
/// pass runs only once, at the top of the render call.
fn process_fragment(text: &str, ctx: &Context) -> String {
    let text = functions::process_calls(text, ctx);
    let text = process_loops(&text, ctx);
    let text = process_conditionals(&text, ctx);
    substitute_variables(&text, ctx)
}

/// Process `for ... endfor` and `range ... end` blocks, earliest first.
fn process_loops(text: &str, ctx: &Context) -> String {
    let mut text = text.to_string();
    let mut cursor = 0usize;

    let step_budget = text.len() + 1;
    for _ in 0..step_budget {
        let for_caps = FOR_RE.captures_at(&text, cursor);
        let range_caps = RANGE_RE.captures_at(&text, cursor);

        // Earliest opener wins; `for` on a tie (they cannot actually tie).
        let use_for = match (&for_caps, &range_caps) {
            (Some(f), Some(r)) => open_start(f) <= open_start(r),
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };

        let (caps, closer, var_name, expr) = if use_for {
            let Some(caps) = for_caps else { break };
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let expr = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            (caps, &*ENDFOR_RE, Some(name.to_string()), expr.to_string())
        } else {
            let Some(caps) = range_caps else { break };
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let (name, expr) = parse_range_binding(raw);
            (caps, &*END_RE, name, expr)
        };

        let Some(open) = caps.get(0) else { break };
        let opener = if use_for { &*FOR_RE } else { &*RANGE_RE };
        let tail = &text[open.end()..];
        let bounds = match_block(tail, opener, None, closer);
        let Some((close_start, close_end)) = bounds.close_span else {
            // Unmatched opener: skip it, cleanup strips the token later.
            cursor = open.end();
            continue;
        };

        let body = &tail[..close_start];
        let output = run_loop(body, &expr, var_name.as_deref(), ctx);

        let start = open.start();
        let end = open.end() + close_end;
        let mut next = String::with_capacity(text.len() - (end - start) + output.len());
        next.push_str(&text[..start]);
        next.push_str(&output);
        next.push_str(&text[end..]);
        text = next;

        // Loop output is fully processed; resume scanning after it.
        cursor = start + output.len();
    }

    text
}

/// Iterate a loop body over the evaluated sequence.
///
/// Only a sequence iterates; any other value (including nil) produces empty
/// output. Each iteration layers a scope binding `.`, `$index`, and the loop
/// variable (when named) over the enclosing context, and iteration outputs
/// concatenate with no separator.
fn run_loop(body: &str, expr: &str, var_name: Option<&str>, ctx: &Context) -> String {
    let Value::List(items) = eval_expr(expr, ctx) else {
        return String::new();
    };
    let mut output = String::new();
    for (index, item) in items.into_iter().enumerate() {
        let mut scope = ctx.child();
        scope.insert(".", item.clone());
        scope.insert("$index", Value::Int(index as i64));
        if let Some(name) = var_name {
            scope.insert(name, item);
        }
        output.push_str(&process_fragment(body, &scope));
    }
    output
}

/// Split a `range` head into an optional `$name :=` binding and the
/// sequence expression.
fn parse_range_binding(raw: &str) -> (Option<String>, String) {
    match raw.split_once(":=") {
        Some((lhs, rhs)) => (Some(lhs.trim().to_string()), rhs.trim().to_string()),
        None => (None, raw.trim().to_string()),
    }
}

/// Process conditionals, reapplying to a fixed point.
///
/// Each substitution removes the directive tokens it consumed, so every pass
/// that changes anything strictly shrinks the directive population and the
/// outer loop terminates; the explicit bound covers malformed input.
fn process_conditionals(text: &str, ctx: &Context) -> String {
    let mut text = text.to_string();

    let pass_budget = text.len() + 1;
    for _ in 0..pass_budget {
        let mut changed = false;
        let mut cursor = 0usize;

        while let Some(caps) = IF_RE.captures_at(&text, cursor) {
            let (Some(open), Some(cond)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let tail = &text[open.end()..];
            let bounds = match_block(tail, &IF_RE, Some(&ELSE_RE), &ENDIF_RE);
            let Some((close_start, close_end)) = bounds.close_span else {
                cursor = open.end();
                continue;
            };

            let truthy = eval_expr(cond.as_str(), ctx).is_truthy();
            let chosen = match bounds.else_span {
                Some((else_start, else_end)) => {
                    if truthy {
                        &tail[..else_start]
                    } else {
                        &tail[else_end..close_start]
                    }
                }
                None => {
                    if truthy {
                        &tail[..close_start]
                    } else {
                        ""
                    }
                }
            };

            // The selected branch re-enters the whole pipeline so nested
            // directives of any kind resolve with the current scope.
            let replacement = process_fragment(chosen, ctx);

            let start = open.start();
            let end = open.end() + close_end;
            let mut next = String::with_capacity(text.len() - (end - start) + replacement.len());
            next.push_str(&text[..start]);
            next.push_str(&replacement);
            next.push_str(&text[end..]);
            text = next;

            changed = true;
            cursor = start + replacement.len();
        }

        if !changed {
            break;
        }
    }

    text
}

/// Substitute every remaining `{{ expr | filters }}` span.
fn substitute_variables(text: &str, ctx: &Context) -> String {
    LEFTOVER_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let span = &caps[0];
            let inner = span[2..span.len() - 2].trim();
            let head = inner.split_whitespace().next().unwrap_or_default();
            if inner.is_empty() || KEYWORDS.contains(&head) {
                // Unmatched directive fragment; cleanup strips it.
                return span.to_string();
            }
            let pieces = filters::split_pipeline(inner);
            let (expr, chain) = match pieces.split_first() {
                Some(split) => split,
                None => return String::new(),
            };
            let value = eval_expr(expr, ctx);
            filters::apply_pipeline(value, chain, ctx).render()
        })
        .into_owned()
}

/// Final defensive pass: strip structurally unmatched directive fragments
/// and repair the markup artifacts stripping introduces. Idempotent.
pub(crate) fn cleanup(text: &str) -> String {
    let text = LEFTOVER_RE.replace_all(text, "");
    let text = EMPTY_ATTR_RE.replace_all(&text, "");
    let text = GAP_BEFORE_GT_RE.replace_all(&text, "\">");
    BLANK_RUN_RE.replace_all(&text, "\n\n").into_owned()
}

fn open_start(caps: &regex::Captures<'_>) -> usize {
    caps.get(0).map(|m| m.start()).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Object, Page, Site};
    use crate::resolver::MemoryLayouts;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn page(title: &str) -> Value {
        Value::Object(Object::Page(Arc::new(Page {
            title: title.to_string(),
            url: format!("/{}/", title.to_lowercase()),
            ..Page::default()
        })))
    }

    fn ctx() -> Context {
        let mut ctx = Context::new();
        ctx.insert("name", Value::Str("Alice".to_string()));
        ctx.insert("posts", Value::List(vec![page("A"), page("B")]));
        ctx.insert(
            "site",
            Value::Object(Object::Site(Arc::new(Site {
                title: "My Site".to_string(),
                ..Site::default()
            }))),
        );
        ctx
    }

    fn render(template: &str) -> String {
        Renderer::default().render(template, &ctx())
    }

    #[test]
    fn test_plain_text_passthrough() {
        assert_eq!(render("Hello, world!"), "Hello, world!");
    }

    #[test]
    fn test_variable_substitution() {
        assert_eq!(render("Hello, {{ name }}!"), "Hello, Alice!");
        assert_eq!(render("{{ site.title }}"), "My Site");
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        assert_eq!(render("[{{ missing }}]"), "[]");
        assert_eq!(render("[{{ site.not_a_real_method }}]"), "[]");
    }

    #[test]
    fn test_conditional_true_and_false() {
        assert_eq!(render("{{ if name }}yes{{ endif }}"), "yes");
        assert_eq!(render("{{ if missing }}yes{{ endif }}"), "");
        assert_eq!(render("{{ if missing }}yes{{ else }}no{{ endif }}"), "no");
    }

    #[test]
    fn test_truthiness_rules() {
        let mut ctx = ctx();
        ctx.insert("empty_list", Value::List(vec![]));
        ctx.insert("empty_str", Value::Str(String::new()));
        ctx.insert("flag_off", Value::Bool(false));
        ctx.insert("nil", Value::Nil);
        ctx.insert("zero", Value::Int(0));
        let r = Renderer::default();

        let t = "{{ if x }}T{{ else }}F{{ endif }}";
        for falsy in ["empty_list", "empty_str", "flag_off", "nil"] {
            let template = t.replace('x', falsy);
            assert_eq!(r.render(&template, &ctx), "F", "{falsy} should be falsy");
        }
        for truthy in ["name", "posts", "zero"] {
            let template = t.replace('x', truthy);
            assert_eq!(r.render(&template, &ctx), "T", "{truthy} should be truthy");
        }
    }

    #[test]
    fn test_nested_conditional_matches_outer_else() {
        let template =
            "{{ if a }}{{ if b }}X{{ else }}Y{{ endif }}Z{{ else }}W{{ endif }}";
        let r = Renderer::default();

        let mut ctx = Context::new();
        ctx.insert("a", Value::Bool(false));
        assert_eq!(r.render(template, &ctx), "W");

        let mut ctx = Context::new();
        ctx.insert("a", Value::Bool(true));
        ctx.insert("b", Value::Bool(false));
        assert_eq!(r.render(template, &ctx), "YZ");

        let mut ctx = Context::new();
        ctx.insert("a", Value::Bool(true));
        ctx.insert("b", Value::Bool(true));
        assert_eq!(r.render(template, &ctx), "XZ");
    }

    #[test]
    fn test_sibling_conditionals() {
        let template = "{{ if name }}1{{ endif }}-{{ if missing }}2{{ else }}3{{ endif }}";
        assert_eq!(render(template), "1-3");
    }

    #[test]
    fn test_for_loop_scoping() {
        let template = "{{ for p in posts }}{{ p.title }} #{{ $index }}{{ endfor }}";
        assert_eq!(render(template), "A #0B #1");
    }

    #[test]
    fn test_loop_current_element_bindings() {
        // `.` and the named variable bind the identical value.
        let template = "{{ for p in posts }}{{ .title }}={{ p.title }};{{ endfor }}";
        assert_eq!(render(template), "A=A;B=B;");
    }

    #[test]
    fn test_range_loop() {
        assert_eq!(
            render("{{ range posts }}{{ .title }}{{ end }}"),
            "AB"
        );
        assert_eq!(
            render("{{ range $p := posts }}{{ $p.title }}#{{ $index }}{{ end }}"),
            "A#0B#1"
        );
    }

    #[test]
    fn test_loop_over_non_sequence_is_empty() {
        assert_eq!(render("[{{ for x in name }}X{{ endfor }}]"), "[]");
        assert_eq!(render("[{{ range missing }}X{{ end }}]"), "[]");
    }

    #[test]
    fn test_nested_loops() {
        let mut ctx = ctx();
        ctx.insert(
            "rows",
            Value::List(vec![
                Value::List(vec![Value::Str("a".to_string()), Value::Str("b".to_string())]),
                Value::List(vec![Value::Str("c".to_string())]),
            ]),
        );
        let r = Renderer::default();
        let template = "{{ for row in rows }}({{ range row }}{{ . }}{{ end }}){{ endfor }}";
        assert_eq!(r.render(template, &ctx), "(ab)(c)");
    }

    #[test]
    fn test_conditional_inside_loop_sees_loop_scope() {
        let mut ctx = Context::new();
        ctx.insert(
            "items",
            Value::List(vec![
                Value::Str("keep".to_string()),
                Value::Str(String::new()),
                Value::Str("also".to_string()),
            ]),
        );
        let r = Renderer::default();
        let template = "{{ for x in items }}{{ if x }}<{{ x }}>{{ endif }}{{ endfor }}";
        assert_eq!(r.render(template, &ctx), "<keep><also>");
    }

    #[test]
    fn test_loop_inside_conditional() {
        let template = "{{ if posts }}{{ for p in posts }}{{ p.title }}{{ endfor }}{{ endif }}";
        assert_eq!(render(template), "AB");

        let mut empty = Context::new();
        empty.insert("posts", Value::List(vec![]));
        let r = Renderer::default();
        assert_eq!(r.render(template, &empty), "");
    }

    #[test]
    fn test_function_call_processing() {
        assert_eq!(render("{{ upper(name) }}"), "ALICE");
        assert_eq!(render("{{ unknown_fn(1,2) }}"), "");
    }

    #[test]
    fn test_filter_pipeline_in_substitution() {
        assert_eq!(render("{{ \"  Hello World  \" | strip | lower }}"), "hello world");
        assert_eq!(render("{{ \"abcdefghij\" | truncate(5) }}"), "ab...");
        assert_eq!(render("{{ posts | size }}"), "2");
        assert_eq!(render("{{ posts | first | upper }}"), "A");
    }

    #[test]
    fn test_unknown_filter_passes_value_through() {
        assert_eq!(render("{{ name | sparkle }}"), "Alice");
    }

    #[test]
    fn test_unmatched_directives_are_stripped() {
        assert_eq!(render("a{{ endif }}b"), "ab");
        assert_eq!(render("a{{ if name }}b"), "ab");
        assert_eq!(render("a{{ endfor }}{{ end }}{{ else }}b"), "ab");
    }

    #[test]
    fn test_cleanup_idempotence() {
        let dirty = "<a href=\"\" {{ endif }}>x</a>\n\n\n\n{{ else }}";
        let once = cleanup(dirty);
        let twice = cleanup(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_cleanup_repairs_empty_attributes() {
        let out = render("<a href=\"{{ missing_url }}\" class=\"x\">go</a>");
        assert_eq!(out, "<a class=\"x\">go</a>");
    }

    #[test]
    fn test_inheritance_override() {
        let resolver = MemoryLayouts::with_layouts([(
            "base.html",
            "<main>{{ block \"body\" }}DEFAULT{{ endblock }}</main>",
        )]);
        let r = Renderer::new(Box::new(resolver));
        let child = "{{ extends \"base\" }}{{ block \"body\" }}CHILD{{ endblock }}";
        let out = r.render(child, &ctx());
        assert!(!out.contains("DEFAULT"));
        assert_eq!(out, "<main>CHILD</main>");
    }

    #[test]
    fn test_inheritance_block_with_directives() {
        let resolver = MemoryLayouts::with_layouts([(
            "base.html",
            "<ul>{{ block \"list\" }}{{ endblock }}</ul>",
        )]);
        let r = Renderer::new(Box::new(resolver));
        let child = "{{ extends \"base\" }}{{ block \"list\" }}{{ for p in posts }}<li>{{ p.title }}</li>{{ endfor }}{{ endblock }}";
        assert_eq!(r.render(child, &ctx()), "<ul><li>A</li><li>B</li></ul>");
    }

    #[test]
    fn test_render_by_name() {
        let resolver = MemoryLayouts::with_layouts([("_default/single.html", "Hi {{ name }}")]);
        let r = Renderer::new(Box::new(resolver));
        let out = r
            .render_by_name("single", &LayoutHint::default(), &ctx())
            .expect("layout exists");
        assert_eq!(out, "Hi Alice");
    }

    #[test]
    fn test_render_by_name_no_layout() {
        let r = Renderer::default();
        let err = r
            .render_by_name("single", &LayoutHint::default(), &ctx())
            .expect_err("no layout registered");
        assert!(matches!(err, RenderError::NoLayout { name } if name == "single"));
    }

    #[test]
    fn test_whole_page_scenario() {
        let mut ctx = ctx();
        ctx.insert(
            "menu",
            Value::List(vec![
                Value::Object(Object::MenuEntry(Arc::new(crate::model::MenuEntry {
                    name: "Home".to_string(),
                    url: "/".to_string(),
                    ..crate::model::MenuEntry::default()
                }))),
                Value::Object(Object::MenuEntry(Arc::new(crate::model::MenuEntry {
                    name: "About".to_string(),
                    url: "/about/".to_string(),
                    ..crate::model::MenuEntry::default()
                }))),
            ]),
        );
        let r = Renderer::default();
        let template = concat!(
            "<nav>{{ for m in menu }}<a href=\"{{ m.url }}\">{{ m.name }}</a>{{ endfor }}</nav>",
            "{{ if posts }}<ol>{{ for p in posts }}<li>{{ p.title | lower }}</li>{{ endfor }}</ol>{{ endif }}",
        );
        assert_eq!(
            r.render(template, &ctx),
            "<nav><a href=\"/\">Home</a><a href=\"/about/\">About</a></nav>\
             <ol><li>a</li><li>b</li></ol>"
        );
    }
}
