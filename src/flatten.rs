//! Parameter flattening.
//!
//! Turns a nested parameter bag into a flat map from dotted paths
//! (`params.beam.length`, `params.loads.2.x`) to scalars, optionally rounding
//! numeric leaves on the way. Flattening never fails: a subtree that cannot be
//! represented contributes nothing and leaves a diagnostic behind.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::config::{ArrayMode, RenderOptions};
use crate::error::Diagnostic;
use crate::types::{ParameterBag, Precision, Scalar};

/// Options for one flattening pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenOptions {
    pub array_mode: ArrayMode,
    pub separator: String,
    pub precision: Option<Precision>,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            array_mode: ArrayMode::Index,
            separator: ",".to_string(),
            precision: None,
        }
    }
}

impl FlattenOptions {
    /// Options derived from render options, falling back to the precision the
    /// bag asks for.
    pub fn for_bag(bag: &ParameterBag, options: &RenderOptions) -> Self {
        Self {
            array_mode: options.array_mode,
            separator: options.join_separator.clone(),
            precision: options.precision.or_else(|| bag.precision()),
        }
    }
}

/// Flattened parameter bag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatMap {
    values: BTreeMap<String, Scalar>,
    /// Paths of objects and index-flattened arrays.
    branches: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl FlatMap {
    pub fn get(&self, path: &str) -> Option<&Scalar> {
        self.values.get(path)
    }

    /// True when `path` names an object or array rather than a scalar.
    pub fn is_branch(&self, path: &str) -> bool {
        self.branches.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Flatten `value` under `prefix`.
pub fn flatten(value: &Value, prefix: &str, options: &FlattenOptions) -> FlatMap {
    let mut out = FlatMap::default();
    walk(value, prefix, options, &mut out);
    out
}

/// Flatten every namespace of a parameter bag.
pub fn flatten_bag(bag: &ParameterBag, options: &FlattenOptions) -> FlatMap {
    let mut out = FlatMap::default();
    for (key, value) in bag.as_map() {
        walk(value, key, options, &mut out);
    }
    out
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn walk(value: &Value, path: &str, options: &FlattenOptions, out: &mut FlatMap) {
    match value {
        Value::Object(map) => {
            if !path.is_empty() {
                out.branches.insert(path.to_string());
            }
            for (key, child) in map {
                walk(child, &child_path(path, key), options, out);
            }
        }
        Value::Array(items) => match options.array_mode {
            ArrayMode::Index => {
                if !path.is_empty() {
                    out.branches.insert(path.to_string());
                }
                for (i, child) in items.iter().enumerate() {
                    walk(child, &child_path(path, &i.to_string()), options, out);
                }
            }
            ArrayMode::Join => {
                let mut parts = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match Scalar::from_json(item) {
                        Some(scalar) => parts.push(round_scalar(scalar, options.precision).to_string()),
                        None => out.diagnostics.push(Diagnostic::warning(
                            "non-scalar-value",
                            format!("skipped non-scalar element {i} of '{path}' while joining"),
                        )),
                    }
                }
                out.values
                    .insert(path.to_string(), Scalar::Text(parts.join(&options.separator)));
            }
            ArrayMode::Json => {
                let rounded = round_value(value, options.precision);
                let text = serde_json::to_string(&rounded).unwrap_or_default();
                out.values.insert(path.to_string(), Scalar::Text(text));
            }
        },
        leaf => {
            if let Some(scalar) = Scalar::from_json(leaf) {
                out.values
                    .insert(path.to_string(), round_scalar(scalar, options.precision));
            }
        }
    }
}

// ------------------------------------------------------------------
// Rounding
// ------------------------------------------------------------------

/// Round to `n` significant figures. `n == 0` leaves the value alone.
///
/// Goes through decimal scientific formatting so the result is the double
/// nearest to the rounded decimal, which makes re-rounding a no-op.
pub fn round_sigfigs(x: f64, n: u32) -> f64 {
    if !x.is_finite() || x == 0.0 || n == 0 {
        return x;
    }
    let digits = (n - 1) as usize;
    format!("{x:.digits$e}").parse().unwrap_or(x)
}

/// Round to `n` digits after the decimal point.
pub fn round_decimals(x: f64, n: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let digits = n as usize;
    format!("{x:.digits$}").parse().unwrap_or(x)
}

pub fn round_f64(x: f64, precision: Precision) -> f64 {
    match precision {
        Precision::Sigfigs(n) => round_sigfigs(x, n),
        Precision::Decimals(n) => round_decimals(x, n),
    }
}

fn integral(x: f64) -> Option<i64> {
    (x.fract() == 0.0 && x.abs() < 9.0e15).then_some(x as i64)
}

/// Round a numeric scalar. Non-numeric scalars pass through.
pub fn round_scalar(scalar: Scalar, precision: Option<Precision>) -> Scalar {
    let Some(precision) = precision else {
        return scalar;
    };
    match scalar {
        Scalar::Int(i) => {
            let rounded = round_f64(i as f64, precision);
            integral(rounded).map_or(Scalar::Float(rounded), Scalar::Int)
        }
        Scalar::Float(f) => Scalar::Float(round_f64(f, precision)),
        other => other,
    }
}

fn round_value(value: &Value, precision: Option<Precision>) -> Value {
    let Some(p) = precision else {
        return value.clone();
    };
    match value {
        Value::Number(n) => {
            let Some(f) = n.as_f64() else {
                return value.clone();
            };
            let rounded = round_f64(f, p);
            match integral(rounded) {
                Some(i) => Value::from(i),
                None => serde_json::Number::from_f64(rounded).map_or(Value::Null, Value::Number),
            }
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| round_value(v, precision)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), round_value(v, precision)))
                .collect(),
        ),
        other => other.clone(),
    }
}
