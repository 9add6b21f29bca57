//! Property tests for rounding, substitution and random selection.

use proptest::prelude::*;
use question_template::config::MissingPolicy;
use question_template::flatten::{FlattenOptions, flatten, round_decimals, round_sigfigs};
use question_template::random::{RngSource, permutation, selection_bounds, selection_mask};
use question_template::template::substitute;
use question_template::{CorrectAnswers, ParameterBag, RenderOptions, render_question_with_rng};
use serde_json::{Value, json};

const OPTION_TEXTS: [&str; 4] = ["Alpha", "Beta &amp; Gamma", "$x<y$", "Delta"];

fn arb_finite() -> impl Strategy<Value = f64> {
    (-1.0e12..1.0e12f64).prop_filter("non-zero", |x| *x != 0.0)
}

/// Integers and strings carrying HTML special characters.
fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|v| json!(v)),
        "[a-z&<>\" ]{0,8}".prop_map(Value::String),
    ]
}

fn leaf_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn choice_template(tag: &str, correct: &[bool; 4]) -> String {
    let options: String = OPTION_TEXTS
        .iter()
        .zip(correct)
        .map(|(text, c)| {
            if *c {
                format!(r#"<pl-answer correct="true">{text}</pl-answer>"#)
            } else {
                format!("<pl-answer>{text}</pl-answer>")
            }
        })
        .collect();
    format!(r#"<{tag} answers-name="q">{options}</{tag}>"#)
}

/// Content of the label attached to input `q-{id}`.
fn label_for<'a>(html: &'a str, id: &str) -> Option<&'a str> {
    let open = format!(r#"<label for="q-{id}">"#);
    let start = html.find(&open)? + open.len();
    let len = html[start..].find("</label>")?;
    Some(&html[start..start + len])
}

fn check_choice_render(tag: &str, correct: [bool; 4], seed: u64) -> Result<(), TestCaseError> {
    let output = render_question_with_rng(
        &choice_template(tag, &correct),
        &ParameterBag::new(),
        &RenderOptions::default(),
        &mut RngSource::seeded(seed),
    );
    let record = output.answer("q").ok_or_else(|| TestCaseError::fail("no answer record"))?;

    let order = record.item_order.clone().unwrap_or_default();
    let mut sorted = order.clone();
    sorted.sort();
    prop_assert_eq!(sorted, vec!["child0", "child1", "child2", "child3"]);

    let positions: Vec<usize> = order
        .iter()
        .filter_map(|id| output.html.find(&format!(r#"value="{id}""#)))
        .collect();
    prop_assert_eq!(positions.len(), 4);
    prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

    let expected: Vec<String> = (0..4).filter(|i| correct[*i]).map(|i| format!("child{i}")).collect();
    prop_assert_eq!(&record.correct_answers, &CorrectAnswers::Choices(expected.clone()));
    for id in &expected {
        let index: usize = id["child".len()..].parse().map_err(|_| TestCaseError::fail("bad id"))?;
        let shown = OPTION_TEXTS[index].replace('<', "&lt;");
        prop_assert_eq!(label_for(&output.html, id), Some(shown.as_str()));
    }
    Ok(())
}

proptest! {
    #[test]
    fn sigfig_rounding_is_idempotent(x in arb_finite(), n in 1u32..12) {
        let once = round_sigfigs(x, n);
        prop_assert_eq!(round_sigfigs(once, n), once);
    }

    #[test]
    fn decimal_rounding_is_idempotent(x in arb_finite(), n in 0u32..8) {
        let once = round_decimals(x, n);
        prop_assert_eq!(round_decimals(once, n), once);
    }

    #[test]
    fn sigfig_rounding_stays_close(x in arb_finite(), n in 1u32..12) {
        let rounded = round_sigfigs(x, n);
        let tolerance = x.abs() * 10f64.powi(1 - n as i32);
        prop_assert!((rounded - x).abs() <= tolerance);
    }

    #[test]
    fn both_placeholder_syntaxes_agree(key in "[a-z][a-z0-9_]{0,8}", value in any::<i64>()) {
        let map = flatten(&json!({ key.clone(): value }), "params", &FlattenOptions::default());
        let square = substitute(&format!("v=[[params.{key}]]"), &map, MissingPolicy::Keep);
        let curly = substitute(&format!("v={{{{params.{key}}}}}"), &map, MissingPolicy::Keep);
        prop_assert_eq!(&square, &format!("v={value}"));
        prop_assert_eq!(square, curly);
    }

    #[test]
    fn every_flattened_path_resolves(
        values in prop::collection::btree_map("[a-z]{1,6}", arb_leaf(), 1..8),
        nested in "[a-z]{1,6}",
    ) {
        let mut params = serde_json::Map::new();
        for (k, v) in &values {
            params.insert(k.clone(), json!(v));
        }
        params.insert(nested.clone() + "_inner", json!({ "values": values.clone() }));
        let map = flatten(&json!({ "params": params }), "", &FlattenOptions::default());
        for (path, scalar) in map.iter() {
            let resolved = substitute(&format!("[[{path}]]"), &map, MissingPolicy::Keep);
            prop_assert_eq!(resolved, scalar.to_string());
        }
        for (k, v) in &values {
            prop_assert_eq!(map.get(&format!("params.{k}")).map(|s| s.to_string()), Some(leaf_text(v)));
            let inner = format!("params.{nested}_inner.values.{k}");
            prop_assert!(map.get(&inner).is_some());
        }
    }

    #[test]
    fn text_without_placeholders_is_untouched(text in "[a-zA-Z0-9 .,;:!?()-]{0,60}") {
        let map = flatten(&json!({"x": 1}), "params", &FlattenOptions::default());
        prop_assert_eq!(substitute(&text, &map, MissingPolicy::Empty), text);
    }

    #[test]
    fn plain_text_renders_unchanged(text in "[a-zA-Z0-9 .,;:!?()-]{0,60}", seed in any::<u64>()) {
        let output = render_question_with_rng(
            &text,
            &ParameterBag::new(),
            &RenderOptions::default(),
            &mut RngSource::seeded(seed),
        );
        prop_assert_eq!(output.html, text);
        prop_assert!(output.diagnostics.is_empty());
    }

    #[test]
    fn permutations_are_permutations(n in 0usize..40, seed in any::<u64>()) {
        let mut order = permutation(&mut RngSource::seeded(seed), n);
        order.sort_unstable();
        prop_assert_eq!(order, (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn mask_size_within_bounds(
        n in 0usize..30,
        a in 0.0f64..=1.0,
        b in 0.0f64..=1.0,
        seed in any::<u64>(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (min, max) = selection_bounds(n, lo, hi);
        let mask = selection_mask(&mut RngSource::seeded(seed), n, lo, hi);
        let kept = mask.iter().filter(|k| **k).count();
        prop_assert_eq!(mask.len(), n);
        prop_assert!(min <= kept && kept <= max);
    }

    #[test]
    fn checkbox_shuffle_keeps_correct_labels(correct in any::<[bool; 4]>(), seed in any::<u64>()) {
        check_choice_render("pl-checkbox", correct, seed)?;
    }

    #[test]
    fn multiple_choice_shuffle_keeps_correct_label(pick in 0usize..4, seed in any::<u64>()) {
        let mut correct = [false; 4];
        correct[pick] = true;
        check_choice_render("pl-multiple-choice", correct, seed)?;
    }

    #[test]
    fn half_of_ten_is_five(seed in any::<u64>()) {
        let mask = selection_mask(&mut RngSource::seeded(seed), 10, 0.5, 0.5);
        prop_assert_eq!(mask.iter().filter(|k| **k).count(), 5);
    }
}
