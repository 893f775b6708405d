/*
 * matcher.rs
 * Copyright (c) 2025 Plinth contributors
 */

//! The directive nesting matcher.
//!
//! A single regex cannot express nesting, so pairing an opener with its own
//! `else`/closer under arbitrary nesting is done with a manual forward scan
//! and a depth counter: nested openers push the depth up, nested closers pop
//! it, and only a depth-zero `else` or closer belongs to the block being
//! matched. The scan is bounded by the input length so malformed input
//! terminates instead of looping.

use once_cell::sync::Lazy;
use regex::Regex;

/// `{{ if cond }}`
pub(crate) static IF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*if\s+([^{}]+?)\s*\}\}").expect("if regex is valid"));

/// `{{ else }}`
pub(crate) static ELSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*else\s*\}\}").expect("else regex is valid"));

/// `{{ endif }}`
pub(crate) static ENDIF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*endif\s*\}\}").expect("endif regex is valid"));

/// `{{ for name in expr }}`
pub(crate) static FOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{\s*for\s+([A-Za-z_][A-Za-z0-9_]*)\s+in\s+([^{}]+?)\s*\}\}")
        .expect("for regex is valid")
});

/// `{{ endfor }}`
pub(crate) static ENDFOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*endfor\s*\}\}").expect("endfor regex is valid"));

/// `{{ range expr }}` (the expression may be `$name := expr`)
pub(crate) static RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*range\s+([^{}]+?)\s*\}\}").expect("range regex is valid"));

/// `{{ end }}` — the trailing `}}` keeps this from matching `endif`/`endfor`.
pub(crate) static END_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*end\s*\}\}").expect("end regex is valid"));

/// Where a block's own `else` and closer sit inside its body text.
///
/// Spans are byte ranges of the directive tokens themselves. `close_span` is
/// `None` when the opener is unmatched; the caller then leaves the fragment
/// for the cleanup pass.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct BlockBounds {
    pub else_span: Option<(usize, usize)>,
    pub close_span: Option<(usize, usize)>,
}

enum Event<'t> {
    Open(regex::Match<'t>),
    Else(regex::Match<'t>),
    Close(regex::Match<'t>),
}

impl Event<'_> {
    fn start(&self) -> usize {
        match self {
            Event::Open(m) | Event::Else(m) | Event::Close(m) => m.start(),
        }
    }
}

/// Scan `body` (the text immediately after an opening directive) for the
/// opener's own `else` and closer, skipping nested blocks.
pub(crate) fn match_block(
    body: &str,
    opener: &Regex,
    else_re: Option<&Regex>,
    closer: &Regex,
) -> BlockBounds {
    let mut cursor = 0usize;
    let mut depth = 0usize;
    let mut else_span: Option<(usize, usize)> = None;

    // Each step consumes at least one directive token, so the number of
    // steps can never exceed the input length; the explicit bound makes
    // termination unconditional even on pathological input.
    let step_budget = body.len() + 1;
    for _ in 0..step_budget {
        let Some(close) = closer.find_at(body, cursor) else {
            // No closer left: this opener is unmatched.
            return BlockBounds {
                else_span,
                close_span: None,
            };
        };

        let mut event = Event::Close(close);
        if let Some(e) = else_re.and_then(|re| re.find_at(body, cursor)) {
            if e.start() < event.start() {
                event = Event::Else(e);
            }
        }
        if let Some(o) = opener.find_at(body, cursor) {
            if o.start() < event.start() {
                event = Event::Open(o);
            }
        }

        match event {
            Event::Open(m) => {
                depth += 1;
                cursor = m.end();
            }
            Event::Close(m) => {
                if depth == 0 {
                    return BlockBounds {
                        else_span,
                        close_span: Some((m.start(), m.end())),
                    };
                }
                depth -= 1;
                cursor = m.end();
            }
            Event::Else(m) => {
                // Only a depth-zero else belongs to this block, and only the
                // first one; anything later is left in place.
                if depth == 0 && else_span.is_none() {
                    else_span = Some((m.start(), m.end()));
                }
                cursor = m.end();
            }
        }
    }

    BlockBounds {
        else_span,
        close_span: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn if_bounds(body: &str) -> BlockBounds {
        match_block(body, &IF_RE, Some(&ELSE_RE), &ENDIF_RE)
    }

    #[test]
    fn test_flat_if_endif() {
        let body = "X{{ endif }}";
        let bounds = if_bounds(body);
        assert_eq!(bounds.else_span, None);
        assert_eq!(bounds.close_span, Some((1, 12)));
    }

    #[test]
    fn test_flat_if_else_endif() {
        let body = "X{{ else }}Y{{ endif }}";
        let bounds = if_bounds(body);
        assert_eq!(bounds.else_span, Some((1, 11)));
        assert_eq!(bounds.close_span, Some((12, 23)));
    }

    #[test]
    fn test_nested_else_belongs_to_inner_block() {
        // Body of the outer if: the inner if has its own else; the outer
        // else comes after the inner endif.
        let body = "{{ if b }}X{{ else }}Y{{ endif }}Z{{ else }}W{{ endif }}";
        let bounds = if_bounds(body);
        let (else_start, else_end) = bounds.else_span.expect("outer else found");
        let (close_start, _) = bounds.close_span.expect("outer endif found");
        assert_eq!(else_start, 34);
        assert_eq!(&body[else_end..close_start], "W");
    }

    #[test]
    fn test_deeply_nested() {
        let body = "{{ if a }}{{ if b }}{{ endif }}{{ endif }}{{ endif }}";
        let bounds = if_bounds(body);
        assert_eq!(bounds.else_span, None);
        assert_eq!(bounds.close_span, Some((42, 53)));
    }

    #[test]
    fn test_unmatched_opener() {
        let bounds = if_bounds("no closer here");
        assert_eq!(bounds.close_span, None);
    }

    #[test]
    fn test_nested_unbalanced_still_terminates() {
        // Inner opener without a closer: the only endif pairs with the inner
        // block, leaving the scanned block unmatched.
        let bounds = if_bounds("{{ if b }}X{{ endif }}");
        assert_eq!(bounds.close_span, None);
    }

    #[test]
    fn test_second_depth_zero_else_ignored() {
        let body = "A{{ else }}B{{ else }}C{{ endif }}";
        let bounds = if_bounds(body);
        assert_eq!(bounds.else_span, Some((1, 11)));
        assert_eq!(bounds.close_span, Some((23, 34)));
    }

    #[test]
    fn test_for_block_matching() {
        let body = "{{ for x in xs }}{{ endfor }}{{ endfor }}";
        let bounds = match_block(body, &FOR_RE, None, &ENDFOR_RE);
        assert_eq!(bounds.close_span, Some((29, 41)));
    }

    #[test]
    fn test_end_does_not_match_endif() {
        let body = "{{ endif }}{{ end }}";
        let bounds = match_block(body, &RANGE_RE, None, &END_RE);
        assert_eq!(bounds.close_span, Some((11, 20)));
    }

    #[test]
    fn test_whitespace_variants() {
        let body = "X{{else}}Y{{   endif   }}";
        let bounds = if_bounds(body);
        assert_eq!(bounds.else_span, Some((1, 9)));
        assert_eq!(bounds.close_span, Some((10, 25)));
    }
}
