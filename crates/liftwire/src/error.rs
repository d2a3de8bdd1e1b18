//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and a distinct process exit code per class.

use miette::Diagnostic;
use thiserror::Error;

use liftwire_config::ConfigError;
use liftwire_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const SUITE_FAILED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not open the WebSocket session: {reason}")]
    #[diagnostic(
        code(liftwire::connection_failed),
        help(
            "Check ws_url and subprotocol in your profile and that the endpoint is reachable.\n\
             Try: liftwire --offline ping   to rule out local problems."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Connection lost while waiting for request {request_id}")]
    #[diagnostic(
        code(liftwire::connection_lost),
        help("The server closed the socket. The next command reconnects automatically.")
    )]
    ConnectionLost { request_id: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(liftwire::auth_failed),
        help(
            "Verify client_id, the client secret and token_url for this profile.\n\
             Store a new secret with: liftwire config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for profile '{profile}'")]
    #[diagnostic(
        code(liftwire::no_credentials),
        help(
            "Configure credentials with: liftwire config init\n\
             Or set LIFTWIRE_CLIENT_ID and LIFTWIRE_CLIENT_SECRET."
        )
    )]
    NoCredentials { profile: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API rejected {call_type} with status {status}")]
    #[diagnostic(code(liftwire::rejected))]
    Rejected { call_type: String, status: u16 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(liftwire::validation))]
    Validation { field: String, reason: String },

    #[error("{failed} check(s) failed and {errored} could not run")]
    #[diagnostic(
        code(liftwire::suite_failed),
        help("Rerun with -v and inspect the evidence log: liftwire evidence")
    )]
    SuiteFailed { failed: usize, errored: usize },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(liftwire::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: liftwire config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No building id for profile '{profile}'")]
    #[diagnostic(
        code(liftwire::no_building),
        help("Pass --building <ID> or set building_id in the profile.")
    )]
    NoBuilding { profile: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(liftwire::config))]
    Config { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No response to request {request_id} within {seconds}s")]
    #[diagnostic(
        code(liftwire::timeout),
        help("Increase the timeout with --timeout or check that the building id is correct.")
    )]
    Timeout { request_id: String, seconds: u64 },

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(liftwire::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(liftwire::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::ConnectionLost { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoBuilding { .. } | Self::ProfileNotFound { .. } => {
                exit_code::USAGE
            }
            Self::SuiteFailed { .. } => exit_code::SUITE_FAILED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { field, reason } => CliError::Validation { field, reason },
            CoreError::AuthenticationFailed { message, .. } => CliError::AuthFailed { message },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::ConnectionLost { request_id } => CliError::ConnectionLost { request_id },
            CoreError::Timeout {
                request_id,
                timeout,
            } => CliError::Timeout {
                request_id,
                seconds: timeout.as_secs(),
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::NoBuilding { profile } => CliError::NoBuilding { profile },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

impl From<liftwire_api::Error> for CliError {
    fn from(err: liftwire_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
