// ── Core error types ──
//
// Driver-level errors. Consumers never see reqwest or tungstenite errors
// directly: the `From<liftwire_api::Error>` impl translates session-layer
// failures into these variants.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Client-side ──────────────────────────────────────────────────
    /// Request rejected before any I/O.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed {
        message: String,
        status: Option<u16>,
    },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot connect to the API: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Connection lost while waiting for request {request_id}")]
    ConnectionLost { request_id: String },

    #[error("No response for request {request_id} within {}s", timeout.as_secs_f64())]
    Timeout {
        request_id: String,
        timeout: Duration,
    },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ─────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ── Conversion from session-layer errors ─────────────────────────────

impl From<liftwire_api::Error> for CoreError {
    fn from(err: liftwire_api::Error) -> Self {
        use liftwire_api::Error as Api;

        match err {
            Api::Validation { field, reason } => CoreError::Validation { field, reason },
            Api::DuplicateRequestId { request_id } => CoreError::Validation {
                field: "request_id".into(),
                reason: format!("{request_id} is already in flight"),
            },
            Api::Authentication { status, body } => CoreError::AuthenticationFailed {
                message: format!("token endpoint returned HTTP {status}: {body}"),
                status: Some(status),
            },
            Api::MalformedToken { message } => CoreError::AuthenticationFailed {
                message: format!("malformed token response: {message}"),
                status: None,
            },
            // Token endpoint unreachable: still an authentication-class failure.
            Api::Transport(e) => CoreError::AuthenticationFailed {
                message: format!("token endpoint unreachable: {e}"),
                status: e.status().map(|s| s.as_u16()),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                reason: format!("TLS error: {msg}"),
            },
            Api::WebSocketConnect(reason) => CoreError::ConnectionFailed { reason },
            Api::ConnectionLost { request_id } => CoreError::ConnectionLost {
                request_id: request_id.to_string(),
            },
            Api::Timeout {
                request_id,
                timeout,
            } => CoreError::Timeout {
                request_id: request_id.to_string(),
                timeout,
            },
            Api::Encode(e) => CoreError::Internal(format!("failed to encode message: {e}")),
            Api::TokenStore(msg) => CoreError::Config {
                message: format!("token cache: {msg}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liftwire_api::CorrelationId;

    #[test]
    fn timeout_keeps_request_id() {
        let err: CoreError = liftwire_api::Error::Timeout {
            request_id: CorrelationId::from(42),
            timeout: Duration::from_secs(30),
        }
        .into();
        assert!(err.is_timeout());
        assert!(matches!(err, CoreError::Timeout { ref request_id, .. } if request_id == "42"));
        assert_eq!(err.to_string(), "No response for request 42 within 30s");
    }

    #[test]
    fn api_validation_stays_validation() {
        let err: CoreError = liftwire_api::Error::validation("message", "must be a JSON object").into();
        assert!(err.is_validation());
    }

    #[test]
    fn auth_failure_keeps_status() {
        let err: CoreError = liftwire_api::Error::Authentication {
            status: 401,
            body: "nope".into(),
        }
        .into();
        assert!(matches!(err, CoreError::AuthenticationFailed { status: Some(401), .. }));
    }
}
