//! Programmatic parameter-bag builder.
//!
//! Generators usually emit the bag as JSON, but tests and embedding code can
//! assemble one directly with [`ParameterBagBuilder`].

use serde_json::{Map, Value};

use crate::types::ParameterBag;

/// Fluent builder for a [`ParameterBag`].
///
/// # Example
///
/// ```
/// use question_template::builder::ParameterBagBuilder;
///
/// let bag = ParameterBagBuilder::new()
///     .param("load", 13000)
///     .correct_answer("maxBendingStress", 4.7)
///     .sigfigs(2)
///     .build();
///
/// assert_eq!(bag.get("params.load"), Some(&serde_json::json!(13000)));
/// assert_eq!(bag.sigfigs(), Some(2));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParameterBagBuilder {
    bag: ParameterBag,
}

impl ParameterBagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing bag.
    pub fn from_bag(bag: ParameterBag) -> Self {
        Self { bag }
    }

    /// Insert `<namespace>.<name>`, replacing a non-object namespace.
    fn insert(&mut self, namespace: &str, name: &str, value: Value) {
        let root = self.bag.as_map_mut();
        if let Some(Value::Object(map)) = root.get_mut(namespace) {
            map.insert(name.to_string(), value);
            return;
        }
        let mut map = Map::new();
        map.insert(name.to_string(), value);
        root.insert(namespace.to_string(), Value::Object(map));
    }

    /// Set `params.<name>`.
    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert("params", name, value.into());
        self
    }

    /// Set `correct_answers.<name>`.
    pub fn correct_answer(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert("correct_answers", name, value.into());
        self
    }

    /// Set `param_labels.<name>`.
    pub fn param_label(mut self, name: &str, label: &str) -> Self {
        self.insert("param_labels", name, Value::String(label.to_string()));
        self
    }

    /// Set `correct_answers_labels.<name>`.
    pub fn answer_label(mut self, name: &str, label: &str) -> Self {
        self.insert("correct_answers_labels", name, Value::String(label.to_string()));
        self
    }

    pub fn sigfigs(mut self, digits: u32) -> Self {
        self.bag.as_map_mut().insert("sigfigs".to_string(), Value::from(digits));
        self
    }

    pub fn n_digits(mut self, digits: u32) -> Self {
        self.bag.as_map_mut().insert("nDigits".to_string(), Value::from(digits));
        self
    }

    /// Set any other top-level key.
    pub fn extra(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.bag.as_map_mut().insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> ParameterBag {
        self.bag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Precision;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn builds_namespaces() {
        let bag = ParameterBagBuilder::new()
            .param("b", 0.2)
            .param("h", 0.4)
            .param_label("b", "width")
            .correct_answer("area", 0.08)
            .answer_label("area", "cross-section area")
            .build();
        assert_eq!(
            bag.to_value(),
            json!({
                "params": {"b": 0.2, "h": 0.4},
                "param_labels": {"b": "width"},
                "correct_answers": {"area": 0.08},
                "correct_answers_labels": {"area": "cross-section area"},
            })
        );
    }

    #[test]
    fn precision_keys() {
        let bag = ParameterBagBuilder::new().n_digits(3).build();
        assert_eq!(bag.precision(), Some(Precision::Decimals(3)));
        let bag = ParameterBagBuilder::from_bag(bag).sigfigs(2).build();
        assert_eq!(bag.precision(), Some(Precision::Sigfigs(2)));
    }

    #[test]
    fn scalar_namespace_is_replaced() {
        let bag = ParameterBagBuilder::new()
            .extra("params", 5)
            .param("x", "y")
            .build();
        assert_eq!(bag.get("params.x"), Some(&json!("y")));
    }

    #[test]
    fn structured_answers() {
        let bag = ParameterBagBuilder::new()
            .correct_answer("K", json!([[1, 0], [0, 1]]))
            .build();
        assert_eq!(bag.get("correct_answers.K.1.1"), Some(&json!(1)));
    }
}
