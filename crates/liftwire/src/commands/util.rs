//! Shared helpers for command handlers.

use liftwire_api::InboundFrame;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Fail with [`CliError::Rejected`] unless the frame carries a 2xx status.
///
/// Frames without a status code are accepted.
pub fn ensure_success(frame: &InboundFrame) -> Result<(), CliError> {
    match frame.status_code() {
        Some(status) if !frame.is_success() => Err(CliError::Rejected {
            call_type: frame.call_type.clone().unwrap_or_else(|| "request".into()),
            status,
        }),
        _ => Ok(()),
    }
}

/// Human-oriented progress line on stderr. Silent for quiet or structured output.
pub fn status_line(global: &GlobalOpts, message: &str) {
    if global.quiet || !matches!(global.output, OutputFormat::Table | OutputFormat::Markdown) {
        return;
    }
    eprintln!("{message}");
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Offline, quiet globals for handler tests.
#[cfg(test)]
pub fn quiet_globals() -> GlobalOpts {
    GlobalOpts {
        profile: None,
        building: None,
        output: OutputFormat::Json,
        color: crate::cli::ColorMode::Never,
        verbose: 0,
        quiet: true,
        timeout: None,
        offline: true,
        log_file: None,
    }
}
