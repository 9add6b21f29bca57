//! Placeholder substitution.
//!
//! Resolves `[[path]]` and `{{path}}` tokens against a [`FlatMap`]. Both
//! syntaxes are synonyms and may be mixed in one template. Substitution is
//! plain text replacement and runs before any tag is interpreted, so tag
//! attributes and literal content may carry placeholders too.
//!
//! # Usage
//!
//! ```
//! use question_template::config::MissingPolicy;
//! use question_template::flatten::{flatten, FlattenOptions};
//! use question_template::template::substitute;
//!
//! let params = serde_json::json!({"load": 12, "unit": "kN"});
//! let map = flatten(&params, "params", &FlattenOptions::default());
//! let text = substitute("F = [[params.load]] {{params.unit}}", &map, MissingPolicy::Keep);
//! assert_eq!(text, "F = 12 kN");
//! ```

use crate::config::MissingPolicy;
use crate::error::Diagnostic;
use crate::flatten::FlatMap;

const DELIMITERS: [(&str, &str); 2] = [("[[", "]]"), ("{{", "}}")];

/// Substitute placeholders, discarding diagnostics.
pub fn substitute(template: &str, map: &FlatMap, policy: MissingPolicy) -> String {
    let mut diagnostics = Vec::new();
    substitute_with_diagnostics(template, map, policy, &mut diagnostics)
}

/// Substitute placeholders, recording unresolved ones in `diagnostics`.
///
/// - Resolved values are inserted verbatim. Escaping happens when the
///   parsed markup is serialized.
/// - Matching is non-greedy: a placeholder ends at the first closing
///   delimiter, and an opener inside a candidate restarts the match there,
///   so `[[a[[b]]` resolves `[[b]]` and keeps `[[a` as text.
/// - A path naming an object or array is treated as missing and always
///   reported.
/// - Whitespace inside delimiters is trimmed.
pub fn substitute_with_diagnostics(
    template: &str,
    map: &FlatMap,
    policy: MissingPolicy,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some((start_pos, open, close)) = next_opener(rest) {
        result.push_str(&rest[..start_pos]);

        let after_open = &rest[start_pos + open.len()..];
        let Some(end_pos) = after_open.find(close) else {
            // No closing delimiter: emit the opener literally and move past it
            result.push_str(open);
            rest = after_open;
            continue;
        };

        let inner = &after_open[..end_pos];
        if let Some((nested, _, _)) = next_opener(inner) {
            result.push_str(open);
            result.push_str(&inner[..nested]);
            rest = &after_open[nested..];
            continue;
        }

        let key = inner.trim();
        let token_len = open.len() + end_pos + close.len();
        let token = &rest[start_pos..start_pos + token_len];
        rest = &after_open[end_pos + close.len()..];

        if !is_path(key) {
            result.push_str(token);
            continue;
        }

        if let Some(value) = map.get(key) {
            result.push_str(&value.to_string());
            continue;
        }

        if map.is_branch(key) {
            let message = format!("placeholder '{key}' refers to an object or array, not a scalar");
            tracing::warn!("{message}");
            diagnostics.push(Diagnostic::warning("non-scalar-placeholder", message));
        }

        match policy {
            MissingPolicy::Keep => result.push_str(token),
            MissingPolicy::Empty => {}
            MissingPolicy::Warn => {
                if !map.is_branch(key) {
                    let message = format!("placeholder '{key}' has no value");
                    tracing::warn!("{message}");
                    diagnostics.push(Diagnostic::warning("missing-placeholder", message));
                }
            }
        }
    }

    result.push_str(rest);
    result
}

/// Earliest opening delimiter of either syntax.
fn next_opener(s: &str) -> Option<(usize, &'static str, &'static str)> {
    DELIMITERS
        .iter()
        .filter_map(|&(open, close)| s.find(open).map(|pos| (pos, open, close)))
        .min_by_key(|(pos, _, _)| *pos)
}

/// Dotted paths: letters, digits, `_`, `-` and `.` only.
fn is_path(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flatten::{FlattenOptions, flatten};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn map() -> FlatMap {
        flatten(
            &json!({
                "params": {"x": 42, "name": "Tom & Jerry", "obj": {"a": 1}},
                "correct_answers": {"y": 1.5}
            }),
            "",
            &FlattenOptions::default(),
        )
    }

    #[test]
    fn bracket_syntax() {
        assert_eq!(substitute("x = [[params.x]]", &map(), MissingPolicy::Keep), "x = 42");
    }

    #[test]
    fn both_syntaxes_are_synonyms() {
        let m = map();
        assert_eq!(
            substitute("[[params.x]]", &m, MissingPolicy::Keep),
            substitute("{{params.x}}", &m, MissingPolicy::Keep)
        );
        assert_eq!(
            substitute("[[params.x]]/{{correct_answers.y}}", &m, MissingPolicy::Keep),
            "42/1.5"
        );
    }

    #[test]
    fn whitespace_inside_delimiters() {
        assert_eq!(substitute("[[  params.x ]]", &map(), MissingPolicy::Keep), "42");
    }

    #[test]
    fn missing_keep_leaves_token() {
        assert_eq!(
            substitute("a [[params.nope]] b", &map(), MissingPolicy::Keep),
            "a [[params.nope]] b"
        );
    }

    #[test]
    fn missing_empty_and_warn() {
        let m = map();
        assert_eq!(substitute("[[params.nope]]", &m, MissingPolicy::Empty), "");
        let mut diags = Vec::new();
        let out = substitute_with_diagnostics("{{params.nope}}", &m, MissingPolicy::Warn, &mut diags);
        assert_eq!(out, "");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "missing-placeholder");
    }

    #[test]
    fn empty_policy_is_silent() {
        let mut diags = Vec::new();
        substitute_with_diagnostics("[[params.nope]]", &map(), MissingPolicy::Empty, &mut diags);
        assert!(diags.is_empty());
    }

    #[test]
    fn nested_opener_does_not_swallow() {
        assert_eq!(substitute("[[a[[params.x]]", &map(), MissingPolicy::Keep), "[[a42");
        assert_eq!(substitute("{{a[[params.x]]}}", &map(), MissingPolicy::Keep), "{{a42}}");
    }

    #[test]
    fn non_greedy_between_tokens() {
        assert_eq!(
            substitute("[[params.x]] and [[correct_answers.y]]", &map(), MissingPolicy::Keep),
            "42 and 1.5"
        );
    }

    #[test]
    fn unclosed_delimiter_is_literal() {
        assert_eq!(
            substitute("price [[ no closing", &map(), MissingPolicy::Keep),
            "price [[ no closing"
        );
    }

    #[test]
    fn non_scalar_path_is_reported() {
        let mut diags = Vec::new();
        let out = substitute_with_diagnostics("[[params.obj]]", &map(), MissingPolicy::Keep, &mut diags);
        assert_eq!(out, "[[params.obj]]");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "non-scalar-placeholder");
        assert!(!out.contains("[object Object]"));
    }

    #[test]
    fn values_are_inserted_verbatim() {
        assert_eq!(
            substitute("[[params.name]]", &map(), MissingPolicy::Keep),
            "Tom & Jerry"
        );
        let units = flatten(&json!({"unit": "N<m & \"x\""}), "params", &FlattenOptions::default());
        assert_eq!(substitute("[[params.unit]]", &units, MissingPolicy::Keep), "N<m & \"x\"");
    }

    #[test]
    fn non_path_content_is_left_alone() {
        let latex = r"\frac{{a + b}}{2}";
        assert_eq!(substitute(latex, &map(), MissingPolicy::Warn), latex);
    }

    #[test]
    fn mismatched_closers_are_not_tokens() {
        assert_eq!(substitute("[[params.x}}", &map(), MissingPolicy::Keep), "[[params.x}}");
    }
}
