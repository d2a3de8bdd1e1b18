// ── File-backed token cache ──
//
// One TOML file holds a `[tokens.<profile>]` table per profile. Writes go
// to a temp file in the same directory and are renamed into place, so a
// reader never sees a half-written cache.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use liftwire_api::{CachedToken, StoredToken, TokenStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    tokens: BTreeMap<String, StoredToken>,
}

/// [`TokenStore`] persisting one profile's token to a shared TOML file.
pub struct FileTokenStore {
    path: PathBuf,
    profile: String,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, profile: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            profile: profile.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the platform cache path.
    pub fn for_profile(profile: impl Into<String>) -> Self {
        Self::new(crate::token_cache_path(), profile)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<CacheFile, liftwire_api::Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(CacheFile::default()),
            Err(e) => return Err(store_error(&self.path, &e)),
        };
        Ok(toml::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable token cache");
            CacheFile::default()
        }))
    }

    fn write_file(&self, cache: &CacheFile) -> Result<(), liftwire_api::Error> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| store_error(dir, &e))?;

        let body = toml::to_string_pretty(cache)
            .map_err(|e| liftwire_api::Error::TokenStore(e.to_string()))?;

        // NamedTempFile is created 0600 on unix.
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| store_error(dir, &e))?;
        tmp.write_all(body.as_bytes())
            .map_err(|e| store_error(tmp.path(), &e))?;
        tmp.persist(&self.path)
            .map_err(|e| store_error(&self.path, &e.error))?;
        Ok(())
    }
}

fn store_error(path: &Path, err: &std::io::Error) -> liftwire_api::Error {
    liftwire_api::Error::TokenStore(format!("{}: {err}", path.display()))
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<CachedToken>, liftwire_api::Error> {
        let mut cache = self.read_file()?;
        Ok(cache.tokens.remove(&self.profile).map(CachedToken::from))
    }

    fn save(&self, token: &CachedToken) -> Result<(), liftwire_api::Error> {
        let _guard = self.write_lock.lock().expect("token cache lock poisoned");
        let mut cache = self.read_file()?;
        cache
            .tokens
            .insert(self.profile.clone(), StoredToken::from(token));
        self.write_file(&cache)
    }

    /// Drop this profile's entry, leaving other profiles untouched.
    fn clear(&self) -> Result<(), liftwire_api::Error> {
        let _guard = self.write_lock.lock().expect("token cache lock poisoned");
        let mut cache = self.read_file()?;
        if cache.tokens.remove(&self.profile).is_some() {
            self.write_file(&cache)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{TimeDelta, Utc};
    use secrecy::{ExposeSecret, SecretString};

    use super::*;

    fn token(value: &str) -> CachedToken {
        CachedToken::new(
            SecretString::from(value.to_string()),
            "Bearer".into(),
            Utc::now() + TimeDelta::hours(1),
        )
    }

    #[test]
    fn missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("tokens.toml"), "default");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn profiles_share_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("tokens.toml");
        let a = FileTokenStore::new(&path, "site-a");
        let b = FileTokenStore::new(&path, "site-b");

        a.save(&token("alpha")).unwrap();
        b.save(&token("bravo")).unwrap();

        assert_eq!(a.load().unwrap().unwrap().secret().expose_secret(), "alpha");
        assert_eq!(b.load().unwrap().unwrap().secret().expose_secret(), "bravo");

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("[tokens.site-a]"));
        assert!(raw.contains("[tokens.site-b]"));
    }

    #[test]
    fn a_fresh_instance_reads_what_another_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.toml");
        FileTokenStore::new(&path, "default").save(&token("persisted")).unwrap();

        let reopened = FileTokenStore::new(&path, "default");
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.secret().expose_secret(), "persisted");
        assert!(loaded.is_valid());
    }

    #[test]
    fn corrupt_cache_is_replaced_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.toml");
        std::fs::write(&path, "not = [valid").unwrap();

        let store = FileTokenStore::new(&path, "default");
        assert!(store.load().unwrap().is_none());
        store.save(&token("fresh")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().secret().expose_secret(), "fresh");
    }

    #[test]
    fn clear_removes_only_one_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.toml");
        let a = FileTokenStore::new(&path, "a");
        let b = FileTokenStore::new(&path, "b");
        a.save(&token("1")).unwrap();
        b.save(&token("2")).unwrap();

        a.clear().unwrap();
        assert!(a.load().unwrap().is_none());
        assert!(b.load().unwrap().is_some());
    }
}
