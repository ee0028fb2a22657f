//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::inference::{LayoutInfo, ModelMetadata};
use crate::pipeline::UnavailablePolicy;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    degraded_mode: bool,
    environment: String,
    version: &'static str,
    timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<ModelMetadata>,
    feature_schema: LayoutInfo,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let provider = state.pipeline.provider();
    let model_loaded = provider.is_loaded();

    Json(HealthResponse {
        status: if model_loaded { "healthy" } else { "degraded" },
        model_loaded,
        degraded_mode: matches!(state.pipeline.policy(), UnavailablePolicy::Degraded { .. }),
        environment: state.config.environment.clone(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model: provider.metadata().cloned(),
        feature_schema: LayoutInfo::current(),
    })
}
