//! Clinical observation model
//!
//! Request payload validation: structure and conversion first, then the
//! clinical domain of each continuous value. Nothing reaches the model until
//! every field has passed both.

use serde_json::{Map, Value};

use crate::error::{Bound, ScoringError};
use crate::inference::layout::{FeatureKind, FeatureSpec, FEATURE_LAYOUT};
use crate::inference::FeatureVector;

/// The six validated inputs for one patient
#[derive(Debug, Clone, PartialEq)]
pub struct ClinicalObservation {
    /// NIH Stroke Scale score, 0-42
    pub nihss: f64,
    /// Systolic blood pressure in mmHg, 0-300
    pub sbp: f64,
    /// Neutrophil count (10^9/L), 0-20
    pub neut: f64,
    /// Red-cell distribution width (%), 0-60
    pub rdw: f64,
    /// TOAST large-artery atherosclerosis subtype
    pub toast_laa: i64,
    /// Intracranial artery stenosis
    pub ias: i64,
}

impl ClinicalObservation {
    /// Parse and validate a raw request body
    pub fn from_body(body: &[u8]) -> Result<Self, ScoringError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ScoringError::MalformedPayload("empty request body".to_string()));
        }

        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ScoringError::MalformedPayload(format!("body is not valid JSON ({})", e)))?;

        match value {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(ScoringError::MalformedPayload(
                "expected a JSON object".to_string(),
            )),
        }
    }

    /// Validate an already-parsed JSON object
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ScoringError> {
        let missing: Vec<&'static str> = FEATURE_LAYOUT
            .iter()
            .filter(|spec| !map.contains_key(spec.key))
            .map(|spec| spec.key)
            .collect();
        if !missing.is_empty() {
            return Err(ScoringError::MissingField(missing));
        }

        let [nihss, sbp, neut, rdw, toast_laa, ias] = &FEATURE_LAYOUT;
        let observation = Self {
            nihss: continuous(map, nihss)?,
            sbp: continuous(map, sbp)?,
            neut: continuous(map, neut)?,
            rdw: continuous(map, rdw)?,
            toast_laa: indicator(map, toast_laa)?,
            ias: indicator(map, ias)?,
        };

        let measured = [observation.nihss, observation.sbp, observation.neut, observation.rdw];
        for (spec, value) in FEATURE_LAYOUT.iter().zip(measured) {
            check_domain(spec, value)?;
        }

        for field in observation.nonbinary_flags() {
            tracing::warn!(field, "Indicator outside {{0, 1}} accepted as-is");
        }

        Ok(observation)
    }

    /// Model input in layout order
    pub fn to_features(&self) -> FeatureVector {
        FeatureVector::new(self.nihss, self.sbp, self.neut, self.rdw, self.toast_laa, self.ias)
    }

    /// Indicator fields holding something other than 0 or 1
    pub fn nonbinary_flags(&self) -> Vec<&'static str> {
        [("toast_laa", self.toast_laa), ("ias", self.ias)]
            .into_iter()
            .filter(|(_, v)| *v != 0 && *v != 1)
            .map(|(name, _)| name)
            .collect()
    }
}

fn continuous(map: &Map<String, Value>, spec: &FeatureSpec) -> Result<f64, ScoringError> {
    as_float(&map[spec.key])
        .ok_or(ScoringError::TypeError { field: spec.key, expected: "a finite number" })
}

fn indicator(map: &Map<String, Value>, spec: &FeatureSpec) -> Result<i64, ScoringError> {
    as_flag(&map[spec.key])
        .ok_or(ScoringError::TypeError { field: spec.key, expected: "an integer" })
}

fn check_domain(spec: &FeatureSpec, value: f64) -> Result<(), ScoringError> {
    let FeatureKind::Continuous { min, max } = spec.kind else {
        return Ok(());
    };

    let bound = if value < min {
        Bound::Min(min)
    } else if value > max {
        Bound::Max(max)
    } else {
        return Ok(());
    };

    Err(ScoringError::RangeError { field: spec.key, value, bound })
}

/// Numbers, or strings holding a decimal number
fn as_float(value: &Value) -> Option<f64> {
    let v = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    v.is_finite().then_some(v)
}

/// Integers, floats truncated toward zero, or strings holding an integer
fn as_flag(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
