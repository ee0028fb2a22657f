//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, ScoringError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    MissingField,
    TypeError,
    RangeError,
    ModelUnavailable,
    InternalError,
}

/// Which end of a field's domain was violated
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Min(f64),
    Max(f64),
}

impl std::fmt::Display for Bound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bound::Min(v) => write!(f, "must be >= {}", v),
            Bound::Max(v) => write!(f, "must be <= {}", v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    // Validation errors
    #[error("invalid request payload: {0}")]
    MalformedPayload(String),

    #[error("missing required field(s): {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    #[error("field '{field}' must be {expected}")]
    TypeError { field: &'static str, expected: &'static str },

    #[error("field '{field}' = {value} is out of range: {bound}")]
    RangeError { field: &'static str, value: f64, bound: Bound },

    // Model errors
    #[error("prediction model is not available")]
    ModelUnavailable,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl ScoringError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScoringError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            ScoringError::MissingField(_) => ErrorKind::MissingField,
            ScoringError::TypeError { .. } => ErrorKind::TypeError,
            ScoringError::RangeError { .. } => ErrorKind::RangeError,
            ScoringError::ModelUnavailable => ErrorKind::ModelUnavailable,
            ScoringError::InternalError(_) => ErrorKind::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ModelUnavailable | ErrorKind::InternalError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ScoringError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ScoringError::InternalError(detail) => {
                tracing::error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": message,
            "error_kind": self.kind(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_lists_all() {
        let err = ScoringError::MissingField(vec!["sbp", "ias"]);
        assert_eq!(err.to_string(), "missing required field(s): sbp, ias");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_range_error_names_bound() {
        let err = ScoringError::RangeError {
            field: "nihss",
            value: 50.0,
            bound: Bound::Max(42.0),
        };
        let msg = err.to_string();
        assert!(msg.contains("nihss"));
        assert!(msg.contains("<= 42"));
    }

    #[test]
    fn test_server_side_statuses() {
        assert_eq!(
            ScoringError::ModelUnavailable.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ScoringError::InternalError("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_detail_not_leaked() {
        let response = ScoringError::InternalError("tree 3 exploded".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Internal server error");
        assert_eq!(body["error_kind"], "internal_error");
    }
}
