use std::time::Duration;

use thiserror::Error;

use crate::envelope::CorrelationId;

/// Top-level error type for the `liftwire-api` crate.
///
/// Covers every failure mode of the session layer: client-side validation,
/// token issuance, HTTP transport, the WebSocket link, and correlation
/// timeouts. `liftwire-core` maps these into driver-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Validation ──────────────────────────────────────────────────
    /// Client-side contract violation. Never reaches the network.
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Authentication ──────────────────────────────────────────────
    /// Token endpoint answered with a non-2xx status.
    #[error("Token request failed (HTTP {status}): {body}")]
    Authentication { status: u16, body: String },

    /// Token endpoint answered 2xx but the body was not a token response.
    #[error("Malformed token response: {message}")]
    MalformedToken { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup failure while building the HTTP client.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// Handshake or frame write failed. The connection is reset.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The link dropped while a request was waiting for its response.
    #[error("Connection lost while waiting for request {request_id}")]
    ConnectionLost { request_id: CorrelationId },

    // ── Correlation ─────────────────────────────────────────────────
    /// No frame with the matching correlation id arrived in time.
    #[error("No response for request {request_id} within {timeout:?}")]
    Timeout {
        request_id: CorrelationId,
        timeout: Duration,
    },

    /// Another in-flight request already owns this correlation id.
    #[error("Request id {request_id} is already in flight")]
    DuplicateRequestId { request_id: CorrelationId },

    // ── Data ────────────────────────────────────────────────────────
    /// Outbound message could not be encoded.
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    // ── Token store ─────────────────────────────────────────────────
    /// Reading or writing the persisted token cache failed.
    #[error("Token store error: {0}")]
    TokenStore(String),
}

impl Error {
    /// Shorthand for a [`Validation`](Self::Validation) error.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure happened before any network I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if token issuance failed.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::MalformedToken { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::ConnectionLost { .. } => true,
            _ => false,
        }
    }

    /// The correlation id this error refers to, if any.
    pub fn request_id(&self) -> Option<&CorrelationId> {
        match self {
            Self::Timeout { request_id, .. }
            | Self::ConnectionLost { request_id }
            | Self::DuplicateRequestId { request_id } => Some(request_id),
            _ => None,
        }
    }
}
