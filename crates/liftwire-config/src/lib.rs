//! Shared configuration for the liftwire CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), the
//! on-disk token cache, and translation to `liftwire_api::SessionConfig`.
//! The CLI adds flag-aware wrappers on top.

mod token_cache;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use liftwire_api::{Credentials, SessionConfig, TlsMode};
use liftwire_core::{DriverTarget, SuiteConfig};

pub use token_cache::FileTokenStore;

pub const DEFAULT_TOKEN_URL: &str = "https://dev.kone.com/api/v2/oauth2/token";
pub const DEFAULT_WS_URL: &str = "wss://dev.kone.com/stream-v2";
pub const DEFAULT_SUBPROTOCOL: &str = "koneapi";
pub const DEFAULT_SCOPE: &str = "application/inventory callgiving/*";

/// Keyring service name; entries are keyed `<profile>/client-secret`.
const KEYRING_SERVICE: &str = "liftwire";
const SECRET_ENV: &str = "LIFTWIRE_CLIENT_SECRET";
const CLIENT_ID_ENV: &str = "LIFTWIRE_CLIENT_ID";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("no building id configured for profile '{profile}'")]
    NoBuilding { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named API profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use: the explicit one, else the configured default.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Entries kept by the in-memory evidence ring.
    #[serde(default = "default_evidence_capacity")]
    pub evidence_capacity: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            evidence_capacity: default_evidence_capacity(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_evidence_capacity() -> usize {
    liftwire_api::evidence::DEFAULT_RING_CAPACITY
}

/// A named API profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_subprotocol")]
    pub subprotocol: String,

    /// OAuth2 scope requested with the token.
    pub scope: Option<String>,

    pub client_id: Option<String>,

    /// Client secret (plaintext, prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    /// Building identifier, with or without the `building:` prefix.
    pub building_id: Option<String>,

    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Extra CA certificate for the token endpoint.
    pub ca_cert: Option<PathBuf>,

    /// JSON-lines evidence log. Defaults to the platform data dir.
    pub evidence_file: Option<PathBuf>,

    pub evidence_capacity: Option<usize>,

    // Validation suite parameters
    pub source_area: Option<u64>,
    pub destination_area: Option<u64>,
    pub lift_deck: Option<u64>,
    pub served_area: Option<u64>,
    pub terminal: Option<u32>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            ws_url: default_ws_url(),
            subprotocol: default_subprotocol(),
            scope: None,
            client_id: None,
            client_secret: None,
            client_secret_env: None,
            building_id: None,
            group_id: default_group_id(),
            timeout: None,
            ca_cert: None,
            evidence_file: None,
            evidence_capacity: None,
            source_area: None,
            destination_area: None,
            lift_deck: None,
            served_area: None,
            terminal: None,
        }
    }
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.into()
}
fn default_ws_url() -> String {
    DEFAULT_WS_URL.into()
}
fn default_subprotocol() -> String {
    DEFAULT_SUBPROTOCOL.into()
}
fn default_group_id() -> String {
    "1".into()
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "liftwire", "liftwire")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("liftwire");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Token cache file, kept apart from the config so it can be wiped freely.
pub fn token_cache_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("tokens.toml"),
        |dirs| dirs.cache_dir().join("tokens.toml"),
    )
}

/// Evidence log for a profile: the configured file or `<data dir>/evidence.jsonl`.
pub fn evidence_path(profile: &Profile) -> PathBuf {
    profile.evidence_file.clone().unwrap_or_else(|| {
        project_dirs().map_or_else(
            || dirs_fallback().join("evidence.jsonl"),
            |dirs| dirs.data_dir().join("evidence.jsonl"),
        )
    })
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
///
/// A missing file yields the defaults; an unreadable or malformed one is an
/// error, never silently replaced.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + `LIFTWIRE_`-prefixed environment (`__` nests keys).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LIFTWIRE_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

pub fn save_config_to(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/client-secret"))
}

/// Store a client secret in the system keyring.
pub fn store_client_secret(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(secret)?;
    Ok(())
}

/// Resolve the client id: profile, then `LIFTWIRE_CLIENT_ID`.
pub fn resolve_client_id(profile: &Profile, profile_name: &str) -> Result<String, ConfigError> {
    profile
        .client_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| std::env::var(CLIENT_ID_ENV).ok())
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

/// Resolve the client secret from the credential chain.
pub fn resolve_client_secret(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's client_secret_env → env var lookup
    if let Some(ref env_name) = profile.client_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var(SECRET_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref secret) = profile.client_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

/// Build a `SessionConfig` from a profile, resolving credentials.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    default_timeout: u64,
) -> Result<SessionConfig, ConfigError> {
    let token_url = parse_url("token_url", &profile.token_url)?;
    let ws_url = parse_url("ws_url", &profile.ws_url)?;
    if !matches!(ws_url.scheme(), "ws" | "wss") {
        return Err(ConfigError::Validation {
            field: "ws_url".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{ws_url}'"),
        });
    }

    let credentials = Credentials::new(
        resolve_client_id(profile, profile_name)?,
        resolve_client_secret(profile, profile_name)?,
    );

    let timeout = Duration::from_secs(profile.timeout.unwrap_or(default_timeout));
    let mut config = SessionConfig::new(token_url, ws_url, profile.subprotocol.clone(), credentials)
        .with_scope(profile.scope.clone().unwrap_or_else(|| DEFAULT_SCOPE.into()))
        .with_request_timeout(timeout);
    if let Some(ref ca) = profile.ca_cert {
        config.transport.tls = TlsMode::CustomCa(ca.clone());
    }
    Ok(config)
}

/// Building and group for driver calls. `building_override` wins over the profile.
pub fn profile_target(
    profile: &Profile,
    profile_name: &str,
    building_override: Option<&str>,
) -> Result<DriverTarget, ConfigError> {
    let building = building_override
        .or(profile.building_id.as_deref())
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ConfigError::NoBuilding {
            profile: profile_name.into(),
        })?;
    Ok(DriverTarget::new(building, profile.group_id.clone()))
}

/// Suite parameters, falling back to the built-in defaults per field.
pub fn profile_suite_config(profile: &Profile) -> SuiteConfig {
    let defaults = SuiteConfig::default();
    SuiteConfig {
        source_area: profile.source_area.unwrap_or(defaults.source_area),
        destination_area: profile.destination_area.unwrap_or(defaults.destination_area),
        terminal: profile.terminal.unwrap_or(defaults.terminal),
        lift_deck: profile.lift_deck.unwrap_or(defaults.lift_deck),
        served_area: profile.served_area.unwrap_or(defaults.served_area),
        ..defaults
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile() -> Profile {
        Profile {
            client_id: Some("id".into()),
            client_secret: Some("plain".into()),
            building_id: Some("4TFxWRCv23D".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "site-a"

[defaults]
output = "json"

[profiles.site-a]
client_id = "abc"
building_id = "building:xyz"
group_id = "2"
source_area = 3000
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.active_profile_name(None), "site-a");
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);

        let p = cfg.profile("site-a").unwrap();
        assert_eq!(p.ws_url, DEFAULT_WS_URL);
        assert_eq!(p.group_id, "2");
        assert_eq!(profile_suite_config(p).source_area, 3000);
        assert_eq!(profile_suite_config(p).destination_area, 2000);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.active_profile_name(Some("x")), "x");
        assert!(matches!(cfg.profile("x"), Err(ConfigError::ProfileNotFound { .. })));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_profile = \"site\"\n[profiles.site\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("default".into(), profile());

        save_config_to(&path, &cfg).unwrap();
        let back = load_config_from(&path).unwrap();
        assert_eq!(back.profile("default").unwrap().building_id.as_deref(), Some("4TFxWRCv23D"));
    }

    #[test]
    fn session_config_from_profile() {
        let cfg = profile_to_session_config(&profile(), "default", 12).unwrap();
        assert_eq!(cfg.ws_url.as_str(), DEFAULT_WS_URL);
        assert_eq!(cfg.subprotocol, DEFAULT_SUBPROTOCOL);
        assert_eq!(cfg.scope, DEFAULT_SCOPE);
        assert_eq!(cfg.request_timeout, Duration::from_secs(12));
        assert_eq!(cfg.credentials.client_id(), "id");
    }

    #[test]
    fn http_ws_url_is_rejected() {
        let p = Profile {
            ws_url: "https://example.com/stream".into(),
            ..profile()
        };
        let err = profile_to_session_config(&p, "default", 30).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "ws_url"));
    }

    #[test]
    fn plaintext_secret_is_last_resort() {
        let p = Profile {
            client_secret_env: Some("LIFTWIRE_TEST_SECRET_UNSET_6d1f".into()),
            ..profile()
        };
        // Neither env var is set in the test environment.
        if std::env::var(SECRET_ENV).is_err() {
            let secret = resolve_client_secret(&p, "liftwire-test-no-keyring").unwrap();
            assert_eq!(secret.expose_secret(), "plain");
        }
    }

    #[test]
    fn missing_secret_is_no_credentials() {
        let p = Profile {
            client_secret: None,
            ..profile()
        };
        if std::env::var(SECRET_ENV).is_err() {
            let err = resolve_client_secret(&p, "liftwire-test-no-keyring").unwrap_err();
            assert!(matches!(err, ConfigError::NoCredentials { .. }));
        }
    }

    #[test]
    fn building_override_wins() {
        let target = profile_target(&profile(), "default", Some("other")).unwrap();
        assert_eq!(target.building_id.as_str(), "building:other");

        let target = profile_target(&profile(), "default", None).unwrap();
        assert_eq!(target.building_id.as_str(), "building:4TFxWRCv23D");

        let p = Profile {
            building_id: None,
            ..profile()
        };
        assert!(matches!(
            profile_target(&p, "default", None),
            Err(ConfigError::NoBuilding { .. })
        ));
    }
}
