//! Risk assessment model

use serde::Serialize;

/// Probability at which a patient is classified high risk (29%)
pub const HIGH_RISK_CUTOFF: f64 = 0.29;

/// Scale for rounding the reported percentage to six decimal places
const PERCENT_PRECISION: f64 = 1e6;

/// Two-tier END risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "低风险")]
    Low,
    #[serde(rename = "高风险")]
    High,
}

impl RiskLevel {
    /// Classify a positive-class probability in [0, 1]
    pub fn from_probability(probability: f64) -> Self {
        if probability >= HIGH_RISK_CUTOFF {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }

    /// Advisory text shown with the result
    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Low => "患者发生早期神经功能恶化的风险较低，建议按常规进行治疗和监测。",
            RiskLevel::High => "患者发生早期神经功能恶化的风险较高，建议密切监测病情变化，及时进行干预。",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "LOW"),
            RiskLevel::High => write!(f, "HIGH"),
        }
    }
}

/// Outcome of one scoring request
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Deterioration probability as a percentage, 0-100
    pub probability: f64,
    pub level: RiskLevel,
    pub description: &'static str,
}

impl RiskAssessment {
    /// Classification uses `probability` itself; the percentage is rounded
    /// so that a probability of exactly 0.29 reports 29.0, not 28.999...
    pub fn from_probability(probability: f64) -> Self {
        let level = RiskLevel::from_probability(probability);
        Self {
            probability: (probability * 100.0 * PERCENT_PRECISION).round() / PERCENT_PRECISION,
            level,
            description: level.description(),
        }
    }
}
