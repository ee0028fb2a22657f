//! Scoring pipeline
//!
//! validate → build features → score → classify. Each stage either hands a
//! value to the next one or stops the request with a `ScoringError`.

use std::sync::Arc;

use crate::error::ScoringError;
use crate::inference::{FeatureVector, InferenceError, ModelProvider};
use crate::models::{ClinicalObservation, RiskAssessment};

/// What a request gets while the model is unavailable
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnavailablePolicy {
    /// Reject with `ModelUnavailable`
    FailClosed,
    /// Answer with a fixed placeholder probability
    Degraded { probability: f64 },
}

/// A successful assessment, flagged when it came from the placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub assessment: RiskAssessment,
    pub degraded: bool,
}

pub struct ScoringPipeline {
    provider: Arc<ModelProvider>,
    policy: UnavailablePolicy,
}

impl ScoringPipeline {
    pub fn new(provider: Arc<ModelProvider>, policy: UnavailablePolicy) -> Self {
        if let (UnavailablePolicy::Degraded { probability }, false) = (policy, provider.is_loaded()) {
            tracing::error!(
                probability,
                "Degraded mode active: predictions will use a placeholder probability"
            );
        }
        Self { provider, policy }
    }

    pub fn provider(&self) -> &ModelProvider {
        &self.provider
    }

    pub fn policy(&self) -> UnavailablePolicy {
        self.policy
    }

    /// Run the whole pipeline on a raw request body
    pub fn assess(&self, body: &[u8]) -> Result<Scored, ScoringError> {
        let observation = match ClinicalObservation::from_body(body) {
            Ok(observation) => observation,
            Err(e) => {
                tracing::info!(kind = ?e.kind(), "Validation failed: {}", e);
                return Err(e);
            }
        };
        tracing::debug!(?observation, "Validation passed");

        let features = observation.to_features();
        tracing::debug!(features = %features.to_log_entry(), "Features built");

        let scored = self.score_features(&features)?;
        tracing::info!(
            probability = scored.assessment.probability,
            level = %scored.assessment.level,
            degraded = scored.degraded,
            "Assessment complete"
        );

        Ok(scored)
    }

    /// Score an already-built feature vector and classify the result
    pub fn score_features(&self, features: &FeatureVector) -> Result<Scored, ScoringError> {
        match self.provider.score(features) {
            Ok(probability) => Ok(Scored {
                assessment: RiskAssessment::from_probability(probability),
                degraded: false,
            }),
            Err(InferenceError::Unavailable(reason)) => match self.policy {
                UnavailablePolicy::FailClosed => {
                    tracing::error!("Rejecting prediction, model unavailable: {}", reason);
                    Err(ScoringError::ModelUnavailable)
                }
                UnavailablePolicy::Degraded { probability } => {
                    tracing::error!(
                        probability,
                        "Model unavailable ({}), answering with placeholder probability",
                        reason
                    );
                    Ok(Scored {
                        assessment: RiskAssessment::from_probability(probability),
                        degraded: true,
                    })
                }
            },
            Err(e) => Err(ScoringError::InternalError(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::inference::tests::fixed_provider;
    use crate::models::RiskLevel;

    const BODY: &[u8] = br#"{"nihss":10,"sbp":140,"neut":5,"rdw":13,"toast_laa":1,"ias":0}"#;

    fn pipeline(p: f64) -> ScoringPipeline {
        ScoringPipeline::new(Arc::new(fixed_provider(p)), UnavailablePolicy::FailClosed)
    }

    #[test]
    fn test_low_risk_scenario() {
        let scored = pipeline(0.155).assess(BODY).unwrap();
        assert!(!scored.degraded);
        assert_eq!(scored.assessment.probability, 15.5);
        assert_eq!(scored.assessment.level, RiskLevel::Low);
        assert_eq!(scored.assessment.description, RiskLevel::Low.description());
    }

    #[test]
    fn test_high_risk_scenario() {
        let scored = pipeline(0.35).assess(BODY).unwrap();
        assert_eq!(scored.assessment.level, RiskLevel::High);
    }

    #[test]
    fn test_idempotent() {
        let p = pipeline(0.42);
        let first = p.assess(BODY).unwrap();
        for _ in 0..5 {
            assert_eq!(p.assess(BODY).unwrap(), first);
        }
    }

    #[test]
    fn test_validation_stops_before_model() {
        // An unavailable model would yield ModelUnavailable if reached
        let p = ScoringPipeline::new(
            Arc::new(ModelProvider::unavailable("not loaded")),
            UnavailablePolicy::FailClosed,
        );
        let err = p.assess(br#"{"nihss":50,"sbp":140,"neut":5,"rdw":13,"toast_laa":1,"ias":0}"#)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RangeError);
    }

    #[test]
    fn test_unavailable_fails_closed() {
        let p = ScoringPipeline::new(
            Arc::new(ModelProvider::unavailable("missing artifact")),
            UnavailablePolicy::FailClosed,
        );
        assert_eq!(p.assess(BODY).unwrap_err(), ScoringError::ModelUnavailable);
    }

    #[test]
    fn test_unavailable_degraded_mode() {
        let p = ScoringPipeline::new(
            Arc::new(ModelProvider::unavailable("missing artifact")),
            UnavailablePolicy::Degraded { probability: 0.155 },
        );
        let scored = p.assess(BODY).unwrap();
        assert!(scored.degraded);
        assert_eq!(scored.assessment.probability, 15.5);
        assert_eq!(scored.assessment.level, RiskLevel::Low);
    }

    #[test]
    fn test_degraded_policy_ignored_when_loaded() {
        let p = ScoringPipeline::new(
            Arc::new(fixed_provider(0.9)),
            UnavailablePolicy::Degraded { probability: 0.155 },
        );
        let scored = p.assess(BODY).unwrap();
        assert!(!scored.degraded);
        assert_eq!(scored.assessment.level, RiskLevel::High);
    }

    #[test]
    fn test_bad_model_output_is_internal() {
        let err = pipeline(2.0).assess(BODY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
    }
}
