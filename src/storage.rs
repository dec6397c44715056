//! Durable key/value state for the console, kept in a single JSON file.
//!
//! Holds the admin credential, the admin profile and the previously seen
//! siren alerts. Everything here is cleared on logout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::AdminError;

pub const ADMIN_TOKEN: &str = "adminToken";
pub const ADMIN_DATA: &str = "adminData";
pub const SIREN_ALERTS: &str = "sirenAlerts";

const STATE_FILE: &str = "state.json";

pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl LocalStore {
    /// Opens (or creates) the state file inside `dir`.
    pub fn open(dir: &Path) -> Result<Self, AdminError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(STATE_FILE);

        let entries = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AdminError> {
        let entries = self.lock();
        match entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), AdminError> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        self.flush(&entries)
    }

    pub fn token(&self) -> Result<Option<String>, AdminError> {
        Ok(self
            .get::<String>(ADMIN_TOKEN)?
            .filter(|token| !token.trim().is_empty()))
    }

    /// Drops the credential, profile and remembered alerts.
    pub fn clear_session(&self) -> Result<(), AdminError> {
        let mut entries = self.lock();
        for key in [ADMIN_TOKEN, ADMIN_DATA, SIREN_ALERTS] {
            entries.remove(key);
        }
        self.flush(&entries)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), AdminError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
