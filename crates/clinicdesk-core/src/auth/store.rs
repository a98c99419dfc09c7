use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, CredentialBackend, APP_NAME};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Keychain account names under the `clinicdesk` service
const TOKEN_ACCOUNT: &str = "token";
const ROUTE_ACCOUNT: &str = "current-route";

/// Durable key/value storage for the bearer token and remembered route.
///
/// Errors mean the backing storage itself is broken; callers treat them as
/// fatal rather than as "no token".
pub trait CredentialStore: Send + Sync {
    fn read_token(&self) -> Result<Option<String>>;
    fn write_token(&self, token: &str) -> Result<()>;
    /// Remove token and remembered route together.
    fn clear(&self) -> Result<()>;
    fn read_route(&self) -> Result<Option<String>>;
    fn write_route(&self, path: &str) -> Result<()>;
    fn clear_route(&self) -> Result<()>;
}

/// Pick the backend named in the config.
pub fn open_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    match config.credential_backend {
        CredentialBackend::File => {
            let path = config.data_dir()?.join(SESSION_FILE);
            debug!(?path, "Using file credential store");
            Ok(Arc::new(FileCredentialStore::new(path)))
        }
        CredentialBackend::Keyring => {
            debug!("Using keyring credential store");
            Ok(Arc::new(KeyringCredentialStore::new(APP_NAME)))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: Option<String>,
    pub route: Option<String>,
}

// ============================================================================
// File
// ============================================================================

/// One JSON document holding both keys. Every write replaces the whole file
/// through a rename, so readers see either the old or the new pair.
pub struct FileCredentialStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // A panic mid-write leaves the file intact, so poisoning is harmless
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Result<StoredCredentials> {
        if !self.path.exists() {
            return Ok(StoredCredentials::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse session file")
    }

    fn save(&self, data: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
        }
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut StoredCredentials)) -> Result<()> {
        let _guard = self.guard();
        let mut data = self.load()?;
        f(&mut data);
        self.save(&data)
    }
}

impl CredentialStore for FileCredentialStore {
    fn read_token(&self) -> Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.load()?.token)
    }

    fn write_token(&self, token: &str) -> Result<()> {
        self.update(|d| d.token = Some(token.to_string()))
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.guard();
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }

    fn read_route(&self) -> Result<Option<String>> {
        let _guard = self.guard();
        Ok(self.load()?.route)
    }

    fn write_route(&self, path: &str) -> Result<()> {
        self.update(|d| d.route = Some(path.to_string()))
    }

    fn clear_route(&self) -> Result<()> {
        self.update(|d| d.route = None)
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Token and route as two entries in the OS keychain.
pub struct KeyringCredentialStore {
    service: String,
}

impl KeyringCredentialStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, account: &str) -> Result<Entry> {
        Entry::new(&self.service, account).context("Failed to create keyring entry")
    }

    fn get(&self, account: &str) -> Result<Option<String>> {
        match self.entry(account)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read from keychain"),
        }
    }

    fn set(&self, account: &str, value: &str) -> Result<()> {
        self.entry(account)?
            .set_password(value)
            .context("Failed to store value in keychain")
    }

    fn delete(&self, account: &str) -> Result<()> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn read_token(&self) -> Result<Option<String>> {
        self.get(TOKEN_ACCOUNT)
    }

    fn write_token(&self, token: &str) -> Result<()> {
        self.set(TOKEN_ACCOUNT, token)
    }

    fn clear(&self) -> Result<()> {
        self.delete(TOKEN_ACCOUNT)?;
        self.delete(ROUTE_ACCOUNT)
    }

    fn read_route(&self) -> Result<Option<String>> {
        self.get(ROUTE_ACCOUNT)
    }

    fn write_route(&self, path: &str) -> Result<()> {
        self.set(ROUTE_ACCOUNT, path)
    }

    fn clear_route(&self) -> Result<()> {
        self.delete(ROUTE_ACCOUNT)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryCredentialStore {
    data: Mutex<StoredCredentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            data: Mutex::new(StoredCredentials {
                token: Some(token.to_string()),
                route: None,
            }),
        }
    }

    pub fn snapshot(&self) -> StoredCredentials {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoredCredentials> {
        self.data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn read_token(&self) -> Result<Option<String>> {
        Ok(self.lock().token.clone())
    }

    fn write_token(&self, token: &str) -> Result<()> {
        self.lock().token = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = StoredCredentials::default();
        Ok(())
    }

    fn read_route(&self) -> Result<Option<String>> {
        Ok(self.lock().route.clone())
    }

    fn write_route(&self, path: &str) -> Result<()> {
        self.lock().route = Some(path.to_string());
        Ok(())
    }

    fn clear_route(&self) -> Result<()> {
        self.lock().route = None;
        Ok(())
    }
}
