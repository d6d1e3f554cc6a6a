//! Error taxonomy for the coordination core.
//!
//! Agent-facing handlers return these directly as structured JSON; the
//! provider-facing webhook handlers absorb them into a playable
//! voice-control document instead, so the telephony boundary never sees an
//! application fault.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use super::twilio::ProviderError;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("webhook signature rejected")]
    Authentication,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    /// Provider RPC failed in a way a retry may fix.
    #[error("provider request failed: {0}")]
    UpstreamTransient(#[source] ProviderError),

    /// Provider reports a state that makes the operation impossible; a
    /// retry against the same target can never succeed.
    #[error("{0}")]
    UpstreamTerminal(String),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),
}

impl CoordinatorError {
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::UpstreamTransient(_) | CoordinatorError::Persistence(_)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            CoordinatorError::Validation(_) => StatusCode::BAD_REQUEST,
            CoordinatorError::Authentication => StatusCode::UNAUTHORIZED,
            CoordinatorError::NotFound(_) => StatusCode::NOT_FOUND,
            CoordinatorError::Conflict(_) => StatusCode::CONFLICT,
            CoordinatorError::UpstreamTransient(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoordinatorError::UpstreamTerminal(_) => StatusCode::GONE,
            CoordinatorError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoordinatorError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "retryable": self.retryable(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_failure_is_retryable() {
        let err = CoordinatorError::UpstreamTransient(ProviderError::Api {
            message: "timeout".into(),
        });
        assert!(err.retryable());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn ended_leg_is_terminal_not_retryable() {
        let err = CoordinatorError::UpstreamTerminal("call has already ended (completed)".into());
        assert!(!err.retryable());
        assert_eq!(err.status(), StatusCode::GONE);
    }

    #[test]
    fn missing_park_row_maps_to_not_found() {
        let err = CoordinatorError::NotFound("parked call");
        assert!(!err.retryable());
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "parked call not found");
    }

    #[test]
    fn race_loss_maps_to_conflict() {
        let err = CoordinatorError::Conflict("call already answered".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
