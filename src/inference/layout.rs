//! Feature Layout - the schema contract between the pipeline and the model
//!
//! The trained artifact expects six inputs in a fixed order. Everything that
//! depends on that order (request validation, vector construction, artifact
//! compatibility checks) reads it from `FEATURE_LAYOUT`.
//!
//! ## Rules:
//! 1. Add, remove or reorder a feature → increment FEATURE_VERSION
//! 2. Rename a model column → increment FEATURE_VERSION

use crc32fast::Hasher;
use serde::Serialize;

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

/// Total number of features
pub const FEATURE_COUNT: usize = 6;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// How a request value is converted before it reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Floating point value inside a closed interval
    Continuous { min: f64, max: f64 },
    /// Integer indicator, nominally 0 or 1
    Flag,
}

/// One column of the model input
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FeatureSpec {
    /// Column name the artifact was trained with
    pub name: &'static str,
    /// JSON key in the request payload
    pub key: &'static str,
    pub kind: FeatureKind,
}

/// Feature columns in the exact order the model consumes them
pub const FEATURE_LAYOUT: [FeatureSpec; FEATURE_COUNT] = [
    FeatureSpec { name: "NIHSS", key: "nihss", kind: FeatureKind::Continuous { min: 0.0, max: 42.0 } },
    FeatureSpec { name: "SBP", key: "sbp", kind: FeatureKind::Continuous { min: 0.0, max: 300.0 } },
    FeatureSpec { name: "NEUT", key: "neut", kind: FeatureKind::Continuous { min: 0.0, max: 20.0 } },
    FeatureSpec { name: "RDW", key: "rdw", kind: FeatureKind::Continuous { min: 0.0, max: 60.0 } },
    FeatureSpec { name: "TOAST-LAA_1", key: "toast_laa", kind: FeatureKind::Flag },
    FeatureSpec { name: "IAS_1", key: "ias", kind: FeatureKind::Flag },
];

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the version and the ordered column names
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);

    for spec in &FEATURE_LAYOUT {
        hasher.update(spec.name.as_bytes());
        hasher.update(&[0]);
    }

    hasher.finalize()
}

/// Column names in model order
pub fn feature_names() -> [&'static str; FEATURE_COUNT] {
    FEATURE_LAYOUT.map(|spec| spec.name)
}

/// Layout summary for `/health` and startup logs
#[derive(Debug, Clone, Serialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: String,
    pub features: Vec<FeatureSpec>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: format!("{:08x}", layout_hash()),
            features: FEATURE_LAYOUT.to_vec(),
        }
    }
}

// ============================================================================
// FEATURE VECTOR
// ============================================================================

/// A single converted input value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Float(f64),
    Flag(i64),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            FeatureValue::Float(v) => v,
            FeatureValue::Flag(v) => v as f64,
        }
    }
}

/// Model input in `FEATURE_LAYOUT` order
///
/// Only constructible from the six named values, so the order cannot drift
/// from the layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    version: u8,
    values: [FeatureValue; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(nihss: f64, sbp: f64, neut: f64, rdw: f64, toast_laa: i64, ias: i64) -> Self {
        Self {
            version: FEATURE_VERSION,
            values: [
                FeatureValue::Float(nihss),
                FeatureValue::Float(sbp),
                FeatureValue::Float(neut),
                FeatureValue::Float(rdw),
                FeatureValue::Flag(toast_laa),
                FeatureValue::Flag(ias),
            ],
        }
    }

    /// Values widened to f64, in layout order
    pub fn to_f64_array(&self) -> [f64; FEATURE_COUNT] {
        self.values.map(|v| v.as_f64())
    }

    /// Structured form for debug logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        let named: serde_json::Map<String, serde_json::Value> = FEATURE_LAYOUT
            .iter()
            .zip(self.values.iter())
            .map(|(spec, value)| {
                (spec.name.to_string(), serde_json::to_value(value).unwrap_or_default())
            })
            .collect();

        serde_json::json!({
            "feature_version": self.version,
            "layout_hash": format!("{:08x}", layout_hash()),
            "features": named,
        })
    }
}
