//! Core value types: parameter bags, flattened scalars, answer records and the
//! render output.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{ConfigError, Diagnostic, Severity};

// ------------------------------------------------------------------
// Scalars
// ------------------------------------------------------------------

/// A leaf value of a parameter bag after flattening.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON leaf. Objects and arrays are not scalars.
    pub fn from_json(value: &Value) -> Option<Scalar> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            }),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Numeric view. Numeric-looking strings count as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(f) => Some(*f),
            Scalar::Text(s) => s.trim().parse().ok(),
            Scalar::Null | Scalar::Bool(_) => None,
        }
    }

    /// Loose truthiness used for adaptive correctness flags.
    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Null => false,
            Scalar::Bool(b) => *b,
            Scalar::Int(i) => *i != 0,
            Scalar::Float(f) => *f != 0.0,
            Scalar::Text(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            ),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

// ------------------------------------------------------------------
// Precision
// ------------------------------------------------------------------

/// Rounding applied to numeric leaves during flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Precision {
    /// Round to N significant figures.
    Sigfigs(u32),
    /// Round to N digits after the decimal point.
    Decimals(u32),
}

// ------------------------------------------------------------------
// Parameter bag
// ------------------------------------------------------------------

/// The generated values and answer key for one question variant.
///
/// Top-level namespaces: `params`, `correct_answers`, and optionally
/// `param_labels`, `correct_answers_labels`, `sigfigs`, `nDigits`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterBag {
    root: Map<String, Value>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(ConfigError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub(crate) fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    /// Clone the whole bag as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    /// Look up a dotted path. Array elements are addressed by index.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn params(&self) -> Option<&Value> {
        self.root.get("params")
    }

    pub fn correct_answers(&self) -> Option<&Value> {
        self.root.get("correct_answers")
    }

    /// `correct_answers.<name>`; `name` may itself be a dotted path.
    pub fn correct_answer(&self, name: &str) -> Option<&Value> {
        self.get(&format!("correct_answers.{name}"))
    }

    pub fn sigfigs(&self) -> Option<u32> {
        self.root.get("sigfigs").and_then(json_u32)
    }

    pub fn n_digits(&self) -> Option<u32> {
        self.root.get("nDigits").and_then(json_u32)
    }

    /// Rounding requested by the bag. `sigfigs` wins over `nDigits`.
    pub fn precision(&self) -> Option<Precision> {
        self.sigfigs()
            .map(Precision::Sigfigs)
            .or_else(|| self.n_digits().map(Precision::Decimals))
    }
}

fn json_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ------------------------------------------------------------------
// Answer records
// ------------------------------------------------------------------

/// Grading key of one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CorrectAnswers {
    Scalar(Scalar),
    /// Ids of the correct options of a checkbox / multiple-choice group.
    Choices(Vec<String>),
    /// Anything richer, e.g. a matrix.
    Structured(Value),
}

/// One grading record per graded widget. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub name: String,
    pub correct_answers: CorrectAnswers,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_order: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigfigs: Option<u32>,
}

// ------------------------------------------------------------------
// Hints and solutions
// ------------------------------------------------------------------

/// Key of the solution/hint map. Numeric levels sort before named ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HintLevel {
    Number(u64),
    Named(String),
}

impl HintLevel {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<u64>() {
            Ok(n) => HintLevel::Number(n),
            Err(_) => HintLevel::Named(trimmed.to_string()),
        }
    }
}

impl fmt::Display for HintLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintLevel::Number(n) => write!(f, "{n}"),
            HintLevel::Named(s) => f.write_str(s),
        }
    }
}

impl Serialize for HintLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Rendered hint HTML keyed by level. Ordered by level, not document position.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SolutionMap {
    entries: BTreeMap<HintLevel, String>,
}

impl SolutionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert hint HTML. A second hint at the same level is appended.
    pub fn insert(&mut self, level: HintLevel, html: String) {
        self.entries
            .entry(level)
            .and_modify(|existing| existing.push_str(&html))
            .or_insert(html);
    }

    pub fn get(&self, level: &HintLevel) -> Option<&str> {
        self.entries.get(level).map(String::as_str)
    }

    /// Highest numeric level present.
    pub fn max_numeric_level(&self) -> Option<u64> {
        self.entries.keys().rev().find_map(|level| match level {
            HintLevel::Number(n) => Some(*n),
            HintLevel::Named(_) => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HintLevel, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ------------------------------------------------------------------
// Render output
// ------------------------------------------------------------------

/// Result of transforming one template against one parameter bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RenderOutput {
    #[serde(rename = "htmlString")]
    pub html: String,
    pub answers: Vec<AnswerRecord>,
    #[serde(rename = "solutionsStrings")]
    pub solutions: SolutionMap,
    pub diagnostics: Vec<Diagnostic>,
}

impl RenderOutput {
    /// Answer record for the widget named `name`.
    pub fn answer(&self, name: &str) -> Option<&AnswerRecord> {
        self.answers.iter().find(|a| a.name == name)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn scalar_display_drops_trailing_zero() {
        assert_eq!(Scalar::Float(13000.0).to_string(), "13000");
        assert_eq!(Scalar::Float(4.7).to_string(), "4.7");
        assert_eq!(Scalar::Null.to_string(), "");
    }

    #[test]
    fn scalar_from_json_rejects_containers() {
        assert_eq!(Scalar::from_json(&json!([1, 2])), None);
        assert_eq!(Scalar::from_json(&json!({"a": 1})), None);
        assert_eq!(Scalar::from_json(&json!(3)), Some(Scalar::Int(3)));
    }

    #[test]
    fn truthiness() {
        assert!(Scalar::Text("True".into()).is_truthy());
        assert!(Scalar::Int(1).is_truthy());
        assert!(!Scalar::Text("false".into()).is_truthy());
        assert!(!Scalar::Null.is_truthy());
    }

    #[test]
    fn bag_must_be_object() {
        assert!(matches!(
            ParameterBag::from_json("[1]"),
            Err(ConfigError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn bag_path_lookup() {
        let bag = ParameterBag::from_value(json!({
            "params": {"arr": [{"x": 1}, {"x": 2}]},
            "correct_answers": {"ans": 4.5}
        }))
        .unwrap();
        assert_eq!(bag.get("params.arr.1.x"), Some(&json!(2)));
        assert_eq!(bag.get("params.arr.9.x"), None);
        assert_eq!(bag.correct_answer("ans"), Some(&json!(4.5)));
    }

    #[test]
    fn sigfigs_win_over_ndigits() {
        let bag = ParameterBag::from_value(json!({"sigfigs": 3, "nDigits": 2})).unwrap();
        assert_eq!(bag.precision(), Some(Precision::Sigfigs(3)));
        let bag = ParameterBag::from_value(json!({"nDigits": "2"})).unwrap();
        assert_eq!(bag.precision(), Some(Precision::Decimals(2)));
    }

    #[test]
    fn hint_levels_sort_numbers_first() {
        let mut map = SolutionMap::new();
        map.insert(HintLevel::parse("solution"), "s".into());
        map.insert(HintLevel::parse("10"), "b".into());
        map.insert(HintLevel::parse("2"), "a".into());
        map.insert(HintLevel::parse("2"), "c".into());
        let keys: Vec<String> = map.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["2", "10", "solution"]);
        assert_eq!(map.get(&HintLevel::Number(2)), Some("ac"));
        assert_eq!(map.max_numeric_level(), Some(10));
    }

    #[test]
    fn output_serializes_with_wire_names() {
        let mut out = RenderOutput {
            html: "<p>x</p>".into(),
            ..Default::default()
        };
        out.answers.push(AnswerRecord {
            name: "q".into(),
            correct_answers: CorrectAnswers::Choices(vec!["child1".into()]),
            item_order: Some(vec!["child1".into(), "child0".into()]),
            sigfigs: None,
        });
        out.solutions.insert(HintLevel::Number(1), "<p>hint</p>".into());
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(
            value,
            json!({
                "htmlString": "<p>x</p>",
                "answers": [{
                    "name": "q",
                    "correct_answers": ["child1"],
                    "item_order": ["child1", "child0"]
                }],
                "solutionsStrings": {"1": "<p>hint</p>"},
                "diagnostics": []
            })
        );
    }
}
