//! Prediction handler

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::models::RiskLevel;
use crate::pipeline::Scored;
use crate::{AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    success: bool,
    risk_probability: f64,
    risk_level: RiskLevel,
    risk_description: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    degraded: bool,
}

impl From<Scored> for PredictResponse {
    fn from(scored: Scored) -> Self {
        Self {
            success: true,
            risk_probability: scored.assessment.probability,
            risk_level: scored.assessment.level,
            risk_description: scored.assessment.description,
            degraded: scored.degraded,
        }
    }
}

/// Score one patient
///
/// The body is taken raw so that empty or non-JSON payloads are reported
/// through the same error shape as every other validation failure.
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<PredictResponse>> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id);

    let scored = span.in_scope(|| {
        tracing::debug!(bytes = body.len(), "Prediction request received");
        state.pipeline.assess(&body)
    })?;

    Ok(Json(PredictResponse::from(scored)))
}
