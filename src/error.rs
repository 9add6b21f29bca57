//! Diagnostics and error types.
//!
//! Nothing a template author writes can make the engine fail. Problems are
//! collected as [`Diagnostic`]s on the output; the error enums below exist for
//! the internal seams (a single widget failing to render, the markup parser
//! giving up) and for the fallible loaders of options and parameter bags.

use serde::Serialize;
use thiserror::Error;

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A problem found while rendering a question. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Stable machine-readable identifier, e.g. `missing-placeholder`.
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{level}[{}]: {}", self.code, self.message)
    }
}

/// A failure rendering one custom tag. The pipeline replaces the offending
/// node with an inline error marker and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error("missing required attribute '{attribute}'")]
    MissingAttribute { attribute: &'static str },

    #[error("invalid value '{value}' for attribute '{attribute}': {reason}")]
    InvalidAttribute {
        attribute: &'static str,
        value: String,
        reason: String,
    },

    #[error("no correct answer found for '{name}'")]
    MissingCorrectAnswer { name: String },

    #[error("parameter '{path}' not found")]
    MissingParameter { path: String },

    #[error("parameter '{path}' is not a matrix: {reason}")]
    NotAMatrix { path: String, reason: String },

    #[error("'{tag}' has no answer options")]
    NoOptions { tag: String },
}

/// Failure loading [`crate::config::RenderOptions`] or a parameter bag.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("parameter bag must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("invalid fracQuestions [{min}, {max}]: values must be finite")]
    InvalidFraction { min: f64, max: f64 },
}
