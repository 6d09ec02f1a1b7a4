//! Durable storage for the session token.
//!
//! Exactly one opaque bearer token is held at a time: writes overwrite,
//! absence is the normal not-logged-in state. The backend is chosen once at
//! startup by [`select_store`] and injected everywhere else as an
//! `Arc<dyn TokenStore>`, so no caller ever branches on the platform:
//!
//! - the OS keychain (`keyring`) on hosts with a usable secure store
//! - a file under the user config directory otherwise
//! - a no-op store when the host offers no storage at all

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use keyring::Entry;
use thiserror::Error;
use tracing::warn;

/// Keyring service name, also the config subdirectory for file storage.
const SERVICE_NAME: &str = "sembra";

/// Key the token is stored under, in every backend.
const TOKEN_KEY: &str = "auth_token";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored token is not usable: {0}")]
    InvalidToken(String),
}

/// Durable holder for the single session token.
///
/// `get_token` returns `Ok(None)` for the no-token-yet case; that is a
/// normal state, not an error. `clear_token` is idempotent.
pub trait TokenStore: Send + Sync {
    fn set_token(&self, token: &str) -> Result<(), StoreError>;
    fn get_token(&self) -> Result<Option<String>, StoreError>;
    fn clear_token(&self) -> Result<(), StoreError>;
}

/// Token storage in the OS keychain.
pub struct KeyringTokenStore {
    entry: Entry,
}

impl KeyringTokenStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            entry: Entry::new(SERVICE_NAME, TOKEN_KEY)?,
        })
    }
}

impl TokenStore for KeyringTokenStore {
    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        self.entry.set_password(token)?;
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>, StoreError> {
        match self.entry.get_password() {
            Ok(token) if token.is_empty() => Ok(None),
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Token storage in a plain file under the user config directory.
///
/// Fallback for hosts without a usable keychain (headless sessions, CI).
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            path: dir.join(TOKEN_KEY),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, token)?;
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let token = contents.trim();
        if token.is_empty() {
            Ok(None)
        } else {
            Ok(Some(token.to_string()))
        }
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local token storage for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set_token(&self, token: &str) -> Result<(), StoreError> {
        let mut slot = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(token.to_string());
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>, StoreError> {
        let slot = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slot.clone())
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        let mut slot = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        Ok(())
    }
}

/// Store for environments with no durable storage at all. Every operation
/// succeeds; reads always come back empty.
pub struct NoopTokenStore;

impl TokenStore for NoopTokenStore {
    fn set_token(&self, _token: &str) -> Result<(), StoreError> {
        Ok(())
    }

    fn get_token(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    fn clear_token(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Pick the storage backend for this host, once, at startup.
///
/// Keychain if an entry can be created, a config-directory file otherwise,
/// a no-op store when the host has no config directory either.
pub fn select_store() -> Arc<dyn TokenStore> {
    match KeyringTokenStore::new() {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "Keychain unavailable, falling back to file storage");
            match dirs::config_dir() {
                Some(dir) => Arc::new(FileTokenStore::new(dir.join(SERVICE_NAME))),
                None => {
                    warn!("No config directory available, session tokens will not persist");
                    Arc::new(NoopTokenStore)
                }
            }
        }
    }
}
