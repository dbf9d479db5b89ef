//! Persistence for the active connection.
//!
//! Every backend has the same semantics: `load` returns the last saved form or
//! [`ConnectionForm::default`], `save` overwrites it, `clear` forgets it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde_json::Value;

use crate::connection::{ConnectionConfig, ConnectionForm};

/// Namespace key the connection is stored under
pub const CONNECTION_KEY: &str = "typesenseConnectionData";

/// Older key some installs still carry; migrated to [`CONNECTION_KEY`] on load
pub const LEGACY_CONNECTION_KEY: &str = "typesenseState";

/// File name of the client-local key-value store inside the data directory
pub const STORE_FILE: &str = "connection.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store lock poisoned")]
    Poisoned,
}

/// Backend holding the active connection
pub trait ConnectionStore: Send + Sync {
    fn load(&self) -> Result<ConnectionForm, StoreError>;
    fn save(&self, config: &ConnectionConfig) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    /// Whether a connection has been saved
    fn is_connected(&self) -> Result<bool, StoreError> {
        Ok(!self.load()?.is_empty())
    }
}

/// Decode a persisted value, falling back to the default form when it is unreadable
pub fn form_from_value(value: Value) -> ConnectionForm {
    match serde_json::from_value(value) {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!("Ignoring unreadable persisted connection: {}", e);
            ConnectionForm::default()
        }
    }
}

/// In-process store, used when embedding the client and in tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    current: RwLock<Option<ConnectionConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            current: RwLock::new(Some(config)),
        }
    }
}

impl ConnectionStore for MemoryStore {
    fn load(&self) -> Result<ConnectionForm, StoreError> {
        let current = self.current.read().map_err(|_| StoreError::Poisoned)?;
        Ok(current
            .as_ref()
            .map(ConnectionConfig::to_form)
            .unwrap_or_default())
    }

    fn save(&self, config: &ConnectionConfig) -> Result<(), StoreError> {
        *self.current.write().map_err(|_| StoreError::Poisoned)? = Some(config.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.current.write().map_err(|_| StoreError::Poisoned)? = None;
        Ok(())
    }
}

/// Client-local key-value store persisted as a JSON object on disk.
///
/// Other keys in the file are preserved across writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process
    lock: RwLock<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    /// Store file inside `data_dir`, creating the directory if needed
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        Ok(Self::new(data_dir.as_ref().join(STORE_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Connection store is corrupt, starting empty: {}", e);
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, Value>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl ConnectionStore for FileStore {
    fn load(&self) -> Result<ConnectionForm, StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_entries()?;

        if let Some(value) = entries.get(CONNECTION_KEY) {
            return Ok(form_from_value(value.clone()));
        }

        match entries.remove(LEGACY_CONNECTION_KEY) {
            Some(legacy) => {
                tracing::info!(
                    "Migrating connection from {} to {}",
                    LEGACY_CONNECTION_KEY,
                    CONNECTION_KEY
                );
                let form = form_from_value(legacy);
                entries.insert(CONNECTION_KEY.to_string(), serde_json::to_value(&form)?);
                self.write_entries(&entries)?;
                Ok(form)
            }
            None => Ok(ConnectionForm::default()),
        }
    }

    fn save(&self, config: &ConnectionConfig) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_entries()?;
        entries.remove(LEGACY_CONNECTION_KEY);
        entries.insert(CONNECTION_KEY.to_string(), serde_json::to_value(config)?);
        self.write_entries(&entries)?;
        tracing::debug!(host = %config.host, port = config.port, "Connection saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.read_entries()?;
        let removed = entries.remove(CONNECTION_KEY).is_some()
            | entries.remove(LEGACY_CONNECTION_KEY).is_some();
        if removed {
            self.write_entries(&entries)?;
        }
        tracing::debug!("Connection cleared");
        Ok(())
    }
}
