//! CLI configuration: a thin wrapper around `liftwire_config`.
//!
//! Adds flag-aware resolution (`--profile`, `--building`, `--timeout`,
//! `--offline`) and wires the session's evidence sinks and token store.

use std::sync::Arc;
use std::time::Duration;

use liftwire_api::{EvidenceRecorder, FileEvidence, MemoryEvidence, Session};
use liftwire_core::{DriverTarget, SuiteConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use liftwire_config::{
    Config, FileTokenStore, Profile, config_path, evidence_path, load_config,
    save_config, store_client_secret,
};

/// Building used by `--offline` runs when none is configured.
const OFFLINE_BUILDING: &str = "offline";

/// The profile a command runs against, after flag overrides.
#[derive(Debug)]
pub struct ResolvedProfile {
    pub name: String,
    pub profile: Profile,
    pub timeout: u64,
    pub evidence_capacity: usize,
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Look up the active profile. Offline runs fall back to built-in defaults.
pub fn resolve(global: &GlobalOpts) -> Result<ResolvedProfile, CliError> {
    let cfg = load_config()?;
    let name = active_profile_name(global, &cfg);

    let profile = match cfg.profiles.get(&name) {
        Some(p) => p.clone(),
        None if global.offline => Profile::default(),
        None => {
            let mut available: Vec<_> = cfg.profiles.keys().cloned().collect();
            available.sort();
            return Err(CliError::ProfileNotFound {
                name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
    };

    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);
    let evidence_capacity = profile
        .evidence_capacity
        .unwrap_or(cfg.defaults.evidence_capacity);

    Ok(ResolvedProfile {
        name,
        profile,
        timeout,
        evidence_capacity,
    })
}

/// Building and group for driver calls.
pub fn target(resolved: &ResolvedProfile, global: &GlobalOpts) -> Result<DriverTarget, CliError> {
    match liftwire_config::profile_target(&resolved.profile, &resolved.name, global.building.as_deref())
    {
        Err(liftwire_config::ConfigError::NoBuilding { .. }) if global.offline => Ok(
            DriverTarget::new(OFFLINE_BUILDING, resolved.profile.group_id.clone()),
        ),
        other => Ok(other?),
    }
}

/// Suite parameters from the profile, with the subscribe wait from the flags.
pub fn suite_config(resolved: &ResolvedProfile, event_wait: Duration) -> SuiteConfig {
    SuiteConfig {
        event_wait,
        ..liftwire_config::profile_suite_config(&resolved.profile)
    }
}

/// Evidence sinks: the profile's append-only log plus an in-memory ring.
pub fn evidence(resolved: &ResolvedProfile) -> Result<(EvidenceRecorder, Arc<MemoryEvidence>), CliError> {
    let ring = Arc::new(MemoryEvidence::new(resolved.evidence_capacity));
    let file = FileEvidence::open(evidence_path(&resolved.profile))?;
    tracing::debug!(path = %file.path().display(), "appending evidence");

    let recorder = EvidenceRecorder::new()
        .with_sink(Arc::new(file))
        .with_sink(ring.clone());
    Ok((recorder, ring))
}

/// Build a live session for the resolved profile.
pub fn session(resolved: &ResolvedProfile, evidence: EvidenceRecorder) -> Result<Session, CliError> {
    let config =
        liftwire_config::profile_to_session_config(&resolved.profile, &resolved.name, resolved.timeout)?
            .with_request_timeout(Duration::from_secs(resolved.timeout));
    let store = Arc::new(FileTokenStore::for_profile(resolved.name.clone()));
    Ok(Session::new(config, store, evidence)?)
}
