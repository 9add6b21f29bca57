//! Render options.
//!
//! Callers usually build [`RenderOptions`] in code, but the same record can be
//! loaded from JSON or YAML so a question bank can keep per-course defaults in
//! a file:
//!
//! ```yaml
//! fracQuestions: [0.5, 0.75]
//! missing: warn
//! arrayMode: join
//! joinSeparator: ", "
//! precision:
//!   sigfigs: 3
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::Precision;

/// What to do with a placeholder whose path is not in the flattened map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingPolicy {
    /// Leave the literal `[[path]]` text in place.
    #[default]
    Keep,
    /// Replace with an empty string.
    Empty,
    /// Replace with an empty string and record a diagnostic.
    Warn,
}

/// How arrays are flattened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayMode {
    /// `arr.0`, `arr.1`, ...
    #[default]
    Index,
    /// One scalar joined with the configured separator.
    Join,
    /// One scalar holding the array serialized as JSON.
    Json,
}

/// Options for one render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// Inclusion-fraction range for random-subset (`pl-quest`) blocks.
    pub frac_questions: (f64, f64),
    pub missing: MissingPolicy,
    pub array_mode: ArrayMode,
    pub join_separator: String,
    /// Overrides the precision requested by the parameter bag.
    pub precision: Option<Precision>,
    /// Base URL for `pl-figure` assets of the current question.
    pub asset_base_url: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            frac_questions: (1.0, 1.0),
            missing: MissingPolicy::Keep,
            array_mode: ArrayMode::Index,
            join_separator: ",".to_string(),
            precision: None,
            asset_base_url: None,
        }
    }
}

impl RenderOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_json::from_str(json)?;
        options.validated()
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let options: Self = serde_yaml::from_str(yaml)?;
        options.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let (min, max) = self.frac_questions;
        if !min.is_finite() || !max.is_finite() {
            return Err(ConfigError::InvalidFraction { min, max });
        }
        Ok(self)
    }

    /// Selection fractions clamped into `[0, 1]` with `min <= max`.
    pub fn selection_range(&self) -> (f64, f64) {
        let clamp = |f: f64| if f.is_finite() { f.clamp(0.0, 1.0) } else { 1.0 };
        let min = clamp(self.frac_questions.0);
        let max = clamp(self.frac_questions.1).max(min);
        (min, max)
    }
}
