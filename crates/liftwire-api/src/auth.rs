// OAuth2 client-credentials token lifecycle.
//
// Tokens are reused until five minutes before expiry. The order of lookup is
// memory, then the injected TokenStore, then the token endpoint. Refresh is
// serialized behind an async mutex so concurrent callers never race two
// token requests.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::evidence::{EvidenceRecorder, Phase};
use crate::token_store::TokenStore;

/// A token is treated as expired this long before its real expiry.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Lifetime assumed when the endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN: u64 = 3600;

// ── Credentials ─────────────────────────────────────────────────────

/// Client-credentials pair. Immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Credentials {
    client_id: String,
    client_secret: SecretString,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: SecretString) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

// ── Token types ─────────────────────────────────────────────────────

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

/// A bearer token with its absolute expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    access_token: SecretString,
    token_type: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: SecretString, token_type: String, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token,
            token_type,
            expires_at,
        }
    }

    /// Build from an endpoint response received at `now`.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let expires_in = response.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        let expires_in = i64::try_from(expires_in).unwrap_or(i64::MAX);
        let expires_at = now
            .checked_add_signed(TimeDelta::seconds(expires_in))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            access_token: SecretString::from(response.access_token),
            token_type: response.token_type,
            expires_at,
        }
    }

    /// `true` while `now` is before `expires_at` minus the refresh margin.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - TimeDelta::seconds(REFRESH_MARGIN_SECS)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn secret(&self) -> &SecretString {
        &self.access_token
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

// ── TokenManager ────────────────────────────────────────────────────

/// Acquires, caches, and refreshes the bearer token.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: Url,
    credentials: Credentials,
    scope: String,
    store: Arc<dyn TokenStore>,
    evidence: EvidenceRecorder,
    current: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        token_url: Url,
        credentials: Credentials,
        scope: impl Into<String>,
        store: Arc<dyn TokenStore>,
        evidence: EvidenceRecorder,
    ) -> Self {
        Self {
            http,
            token_url,
            credentials,
            scope: scope.into(),
            store,
            evidence,
            current: Mutex::new(None),
        }
    }

    /// Return a token valid for at least the refresh margin.
    pub async fn get_token(&self) -> Result<CachedToken, Error> {
        let mut current = self.current.lock().await;
        let now = Utc::now();

        if let Some(token) = current.as_ref().filter(|t| t.is_valid_at(now)) {
            return Ok(token.clone());
        }

        match self.store.load() {
            Ok(Some(token)) if token.is_valid_at(now) => {
                debug!(expires_at = %token.expires_at(), "adopted persisted token");
                *current = Some(token.clone());
                return Ok(token);
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "token store unreadable, requesting a new token"),
        }

        let token = self.request_token().await?;
        if let Err(e) = self.store.save(&token) {
            warn!(error = %e, "failed to persist token");
        }
        *current = Some(token.clone());
        Ok(token)
    }

    /// The in-memory token, valid or not.
    pub async fn cached(&self) -> Option<CachedToken> {
        self.current.lock().await.clone()
    }

    /// Forget the in-memory token. The next call consults the store again.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    /// Forget the in-memory and the persisted token, so the next call goes
    /// to the token endpoint.
    pub async fn discard(&self) -> Result<(), Error> {
        let mut current = self.current.lock().await;
        *current = None;
        self.store.clear()
    }

    async fn request_token(&self) -> Result<CachedToken, Error> {
        info!(url = %self.token_url, client_id = self.credentials.client_id(), "requesting access token");

        self.evidence.record(
            Phase::Request,
            json!({
                "channel": "token",
                "url": self.token_url.as_str(),
                "grant_type": "client_credentials",
                "scope": self.scope,
                "client_id": self.credentials.client_id(),
            }),
        );

        let mut form = vec![("grant_type", "client_credentials")];
        if !self.scope.is_empty() {
            form.push(("scope", self.scope.as_str()));
        }

        let resp = self
            .http
            .post(self.token_url.clone())
            .basic_auth(
                self.credentials.client_id(),
                Some(self.credentials.client_secret.expose_secret()),
            )
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        self.evidence.record(
            Phase::Response,
            json!({
                "channel": "token",
                "status": status.as_u16(),
                "body": serde_json::from_str::<Value>(&body).unwrap_or_else(|_| Value::String(body.clone())),
            }),
        );

        if !status.is_success() {
            return Err(Error::Authentication {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::MalformedToken {
                message: e.to_string(),
            })?;
        let token = CachedToken::from_response(parsed, Utc::now());
        debug!(expires_at = %token.expires_at(), "access token issued");
        Ok(token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.credentials.client_id())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
