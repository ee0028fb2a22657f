//! Model Provider - owns the classifier artifact
//!
//! The artifact is read once at startup. A failed load leaves the provider
//! `Unavailable` for the rest of the process; the pipeline decides what a
//! request gets in that case.

pub mod layout;
pub mod xgboost;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use layout::{FeatureVector, LayoutInfo};
pub use xgboost::XgbModel;

/// Load attempts at startup before the model is declared unavailable
pub const MAX_LOAD_ATTEMPTS: u32 = 2;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported model: {0}")]
    Unsupported(String),

    #[error("malformed tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
}

/// Artifact trained on a different feature layout
#[derive(Debug, Error)]
#[error("feature schema mismatch: expected {expected:?}, artifact has {actual:?}")]
pub struct SchemaMismatch {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model is not loaded: {0}")]
    Unavailable(String),

    #[error("model returned invalid probability {0}")]
    InvalidProbability(f64),
}

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// Binary classifier over the fixed feature layout
///
/// Implementations must be pure: the same vector always yields the same
/// output, and `&self` is shared across request tasks.
pub trait RiskModel: Send + Sync {
    /// `[p_class0, p_class1]` for one observation
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], InferenceError>;

    /// Short description for logs and `/health`
    fn kind(&self) -> String;

    fn tree_count(&self) -> usize {
        0
    }
}

// ============================================================================
// PROVIDER
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub path: String,
    pub kind: String,
    pub sha256: String,
    pub trees: usize,
    pub loaded_at: DateTime<Utc>,
}

pub enum ModelState {
    Loaded {
        model: Arc<dyn RiskModel>,
        metadata: ModelMetadata,
    },
    Unavailable {
        reason: String,
    },
}

pub struct ModelProvider {
    state: ModelState,
}

impl ModelProvider {
    /// Load the artifact at `path`, retrying once before giving up
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::load_with(path.as_ref(), load_artifact)
    }

    fn load_with<R>(path: &Path, mut read: R) -> Self
    where
        R: FnMut(&Path) -> Result<(XgbModel, ModelMetadata), ModelLoadError>,
    {
        let mut last_error = None;

        for attempt in 1..=MAX_LOAD_ATTEMPTS {
            match read(path) {
                Ok((model, metadata)) => {
                    tracing::info!(
                        path = %metadata.path,
                        kind = %metadata.kind,
                        trees = metadata.trees,
                        sha256 = %metadata.sha256,
                        "Model loaded"
                    );
                    return Self::from_model(Arc::new(model), metadata);
                }
                Err(e) => {
                    tracing::warn!(attempt, path = %path.display(), "Model load failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "model was never loaded".to_string());
        tracing::error!(path = %path.display(), "Model unavailable: {}", reason);
        Self::unavailable(reason)
    }

    pub fn from_model(model: Arc<dyn RiskModel>, metadata: ModelMetadata) -> Self {
        Self {
            state: ModelState::Loaded { model, metadata },
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable { reason: reason.into() },
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded { .. })
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        match &self.state {
            ModelState::Loaded { metadata, .. } => Some(metadata),
            ModelState::Unavailable { .. } => None,
        }
    }

    /// Positive-class (deterioration) probability in [0, 1]
    pub fn score(&self, features: &FeatureVector) -> Result<f64, InferenceError> {
        let model = match &self.state {
            ModelState::Loaded { model, .. } => model,
            ModelState::Unavailable { reason } => {
                return Err(InferenceError::Unavailable(reason.clone()))
            }
        };

        let [_, positive] = model.predict_proba(features)?;
        if !positive.is_finite() || !(0.0..=1.0).contains(&positive) {
            return Err(InferenceError::InvalidProbability(positive));
        }

        Ok(positive)
    }
}

/// Read, fingerprint and parse one artifact
fn load_artifact(path: &Path) -> Result<(XgbModel, ModelMetadata), ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));
    let model = XgbModel::from_slice(&bytes)?;

    let metadata = ModelMetadata {
        path: path.display().to_string(),
        kind: model.kind(),
        sha256,
        trees: model.tree_count(),
        loaded_at: Utc::now(),
    };

    Ok((model, metadata))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Returns a fixed probability regardless of input
    pub(crate) struct FixedModel(pub f64);

    impl RiskModel for FixedModel {
        fn predict_proba(&self, _features: &FeatureVector) -> Result<[f64; 2], InferenceError> {
            Ok([1.0 - self.0, self.0])
        }

        fn kind(&self) -> String {
            "fixed".to_string()
        }
    }

    pub(crate) fn fixed_provider(p: f64) -> ModelProvider {
        ModelProvider::from_model(
            Arc::new(FixedModel(p)),
            ModelMetadata {
                path: "memory".to_string(),
                kind: "fixed".to_string(),
                sha256: String::new(),
                trees: 0,
                loaded_at: Utc::now(),
            },
        )
    }

    fn sample() -> FeatureVector {
        FeatureVector::new(10.0, 140.0, 5.0, 13.0, 1, 0)
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&serde_json::to_vec(&xgboost::tests::fixture()).unwrap())
            .unwrap();

        let provider = ModelProvider::load(&path);
        assert!(provider.is_loaded());

        let metadata = provider.metadata().unwrap();
        assert_eq!(metadata.trees, 2);
        assert_eq!(metadata.sha256.len(), 64);

        let p = provider.score(&sample()).unwrap();
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ModelProvider::load(dir.path().join("absent.json"));

        assert!(!provider.is_loaded());
        assert!(provider.metadata().is_none());
        assert!(matches!(
            provider.score(&sample()),
            Err(InferenceError::Unavailable(_))
        ));
    }

    #[test]
    fn test_corrupt_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{\"learner\": ").unwrap();

        let provider = ModelProvider::load(&path);
        match &provider.state {
            ModelState::Unavailable { reason } => assert!(reason.contains("parse")),
            ModelState::Loaded { .. } => panic!("corrupt artifact should not load"),
        }
    }

    fn fixture_artifact(path: &Path) -> Result<(XgbModel, ModelMetadata), ModelLoadError> {
        let bytes = serde_json::to_vec(&xgboost::tests::fixture())?;
        let model = XgbModel::from_slice(&bytes)?;
        let metadata = ModelMetadata {
            path: path.display().to_string(),
            kind: model.kind(),
            sha256: String::new(),
            trees: model.tree_count(),
            loaded_at: Utc::now(),
        };
        Ok((model, metadata))
    }

    #[test]
    fn test_load_retries_once_after_failure() {
        let mut attempts = 0;
        let provider = ModelProvider::load_with(Path::new("model.json"), |path| {
            attempts += 1;
            if attempts == 1 {
                return Err(ModelLoadError::Io(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "read interrupted",
                )));
            }
            fixture_artifact(path)
        });

        assert_eq!(attempts, 2);
        assert!(provider.is_loaded());
    }

    #[test]
    fn test_load_gives_up_after_two_attempts() {
        let mut attempts = 0;
        let provider = ModelProvider::load_with(Path::new("model.json"), |path| {
            attempts += 1;
            Err(ModelLoadError::NotFound(path.to_path_buf()))
        });

        assert_eq!(attempts, MAX_LOAD_ATTEMPTS);
        assert_eq!(attempts, 2);
        assert!(!provider.is_loaded());
    }

    #[test]
    fn test_load_stops_after_success() {
        let mut attempts = 0;
        let provider = ModelProvider::load_with(Path::new("model.json"), |path| {
            attempts += 1;
            fixture_artifact(path)
        });

        assert_eq!(attempts, 1);
        assert_eq!(provider.metadata().unwrap().trees, 2);
    }

    #[test]
    fn test_score_returns_positive_class() {
        let provider = fixed_provider(0.35);
        assert_eq!(provider.score(&sample()).unwrap(), 0.35);
    }

    #[test]
    fn test_score_rejects_out_of_range_probability() {
        let provider = fixed_provider(1.5);
        assert!(matches!(
            provider.score(&sample()),
            Err(InferenceError::InvalidProbability(_))
        ));

        let provider = fixed_provider(f64::NAN);
        assert!(provider.score(&sample()).is_err());
    }
}
