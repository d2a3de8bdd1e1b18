//! Persistence seam for the bearer token cache.
//!
//! [`TokenManager`](crate::auth::TokenManager) consults the store after its
//! in-memory token expires and writes every freshly issued token back, so a
//! restarted process can reuse an unexpired token. The file-backed store
//! lives in `liftwire-config`; this crate ships the in-memory one.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::auth::CachedToken;
use crate::error::Error;

/// Load/save interface for a cached token.
pub trait TokenStore: Send + Sync {
    /// Return the persisted token, if any. Expiry is checked by the caller.
    fn load(&self) -> Result<Option<CachedToken>, Error>;

    /// Persist a freshly issued token, replacing any previous one.
    fn save(&self, token: &CachedToken) -> Result<(), Error>;

    /// Remove the persisted token.
    fn clear(&self) -> Result<(), Error>;
}

/// Plain serializable form of a [`CachedToken`], for stores that write to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

impl From<&CachedToken> for StoredToken {
    fn from(token: &CachedToken) -> Self {
        Self {
            access_token: token.secret().expose_secret().to_owned(),
            expires_at: token.expires_at(),
            token_type: token.token_type().to_owned(),
        }
    }
}

impl From<StoredToken> for CachedToken {
    fn from(stored: StoredToken) -> Self {
        CachedToken::new(
            SecretString::from(stored.access_token),
            stored.token_type,
            stored.expires_at,
        )
    }
}

/// Process-local store. Tokens do not survive a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<CachedToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with `token`.
    pub fn with_token(token: CachedToken) -> Self {
        Self {
            slot: Mutex::new(Some(token)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<CachedToken>, Error> {
        Ok(self.slot.lock().expect("token store lock poisoned").clone())
    }

    fn save(&self, token: &CachedToken) -> Result<(), Error> {
        *self.slot.lock().expect("token store lock poisoned") = Some(token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), Error> {
        *self.slot.lock().expect("token store lock poisoned") = None;
        Ok(())
    }
}
