//! Gateway error type.
//!
//! Internal plumbing only: the interception path itself never surfaces an
//! error to the client (every failure resolves to a synthesized fallback
//! response). `GatewayError` is what the lifecycle tasks and the control
//! routes report.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::cache::CacheError;

/// Errors raised outside the per-request fallback chain.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Cache storage operation failed.
    #[error("cache storage error: {0}")]
    Cache(#[from] CacheError),

    /// Upstream fetch failed.
    #[error("upstream fetch failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// Upstream answered, but not with a cacheable status.
    #[error("upstream returned status {0}")]
    BadStatus(u16),

    /// A request target could not be resolved to an absolute URL.
    #[error("invalid request target: {0}")]
    BadTarget(#[from] url::ParseError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) | Self::BadStatus(_) => StatusCode::BAD_GATEWAY,
            Self::BadTarget(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "control request failed");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Cache(_) => "cache storage unavailable",
            Self::Upstream(_) | Self::BadStatus(_) => "upstream unavailable",
            Self::BadTarget(_) => "invalid request target",
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_status_display() {
        let err = GatewayError::BadStatus(404);
        assert_eq!(err.to_string(), "upstream returned status 404");
    }

    #[test]
    fn test_status_codes() {
        let response = GatewayError::BadStatus(500).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let response = GatewayError::BadTarget(url::ParseError::EmptyHost).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
