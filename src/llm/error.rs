//! Typed errors for the completion gateway.
//!
//! Structured variants let callers tell apart failure modes (auth, rate
//! limit, interrupted stream) without string matching.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credential rejected by the completion service (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Quota exceeded (HTTP 429).
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Malformed request (HTTP 400). Caller error, do not retry.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Server-side failure (HTTP 5xx).
    #[error("Service error: {0}")]
    ServiceError(String),

    /// The stream failed after the response started. Partial content already
    /// delivered to the caller is not retried; the whole turn restarts.
    #[error("Completion stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Connection-level failure before any response arrived.
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl GatewayError {
    /// Map an HTTP error status from the completion service to a typed error.
    pub fn from_http_status(status: reqwest::StatusCode, detail: String) -> Self {
        match status.as_u16() {
            401 => GatewayError::Unauthorized(detail),
            429 => GatewayError::RateLimited(detail),
            400 => GatewayError::BadRequest(detail),
            500..=599 => GatewayError::ServiceError(detail),
            _ => GatewayError::Other(anyhow::anyhow!("HTTP {}: {}", status, detail)),
        }
    }

    /// True when the turn ended mid-response and the caller should discard
    /// any partial text it already received.
    pub fn is_interruption(&self) -> bool {
        matches!(self, GatewayError::StreamInterrupted(_))
    }

    /// True for transient failures where the conversation can continue and
    /// the same turn can simply be sent again. Credential and request
    /// errors (`Unauthorized`, `BadRequest`) are not recoverable: retrying
    /// the identical turn would fail the same way.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GatewayError::RateLimited(_)
                | GatewayError::ServiceError(_)
                | GatewayError::Network(_)
                | GatewayError::StreamInterrupted(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        let err = GatewayError::from_http_status(
            reqwest::StatusCode::UNAUTHORIZED,
            "bad key".to_string(),
        );
        assert!(matches!(err, GatewayError::Unauthorized(_)));

        let err = GatewayError::from_http_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "quota".to_string(),
        );
        assert!(matches!(err, GatewayError::RateLimited(_)));

        let err = GatewayError::from_http_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "boom".to_string(),
        );
        assert!(matches!(err, GatewayError::ServiceError(_)));
    }

    #[test]
    fn only_stream_interrupted_is_interruption() {
        assert!(GatewayError::StreamInterrupted("eof".into()).is_interruption());
        assert!(!GatewayError::Network("refused".into()).is_interruption());
    }

    #[test]
    fn transient_failures_are_recoverable() {
        assert!(GatewayError::RateLimited("quota".into()).is_recoverable());
        assert!(GatewayError::ServiceError("boom".into()).is_recoverable());
        assert!(GatewayError::Network("refused".into()).is_recoverable());
        assert!(GatewayError::StreamInterrupted("eof".into()).is_recoverable());
    }

    #[test]
    fn credential_and_request_errors_are_not_recoverable() {
        assert!(!GatewayError::Unauthorized("bad key".into()).is_recoverable());
        assert!(!GatewayError::BadRequest("malformed".into()).is_recoverable());
        assert!(!GatewayError::Other(anyhow::anyhow!("odd")).is_recoverable());
    }

    #[test]
    fn display_includes_detail() {
        let err = GatewayError::StreamInterrupted("connection reset".to_string());
        assert!(err.to_string().contains("connection reset"));
    }
}
