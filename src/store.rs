//! Small persistent key/value store and the device identity kept in it.
//!
//! Values are strings in a flat JSON object on disk (`store.json` in the
//! config directory). Every write rewrites the whole file.

use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

pub const STORE_FILE: &str = "store.json";
pub const EQUIPMENT_ID_KEY: &str = "equipment_id";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store {path}: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// JSON-file backed string map.
#[derive(Debug)]
pub struct LocalStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let values = match std::fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            values: Mutex::new(values),
        })
    }

    /// Open `store.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Result<Self, StoreError> {
        Self::open(&dir.join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.lock();
        values.insert(key.to_string(), value.to_string());
        self.persist(&values)
    }

    /// Remove a key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut values = self.lock();
        if values.remove(key).is_none() {
            return Ok(false);
        }
        self.persist(&values)?;
        Ok(true)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A panic mid-write leaves the map intact; keep using it.
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

// ============================================================================
// Equipment id
// ============================================================================

/// 16 OS-random bytes as lowercase hex in `8-4-4-4-12` groups.
pub fn generate_equipment_id() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// The persisted device id, created on first use.
pub fn equipment_id(store: &LocalStore) -> Result<String, StoreError> {
    if let Some(existing) = store.get(EQUIPMENT_ID_KEY).filter(|v| !v.is_empty()) {
        return Ok(existing);
    }
    let id = generate_equipment_id();
    store.set(EQUIPMENT_ID_KEY, &id)?;
    tracing::info!(equipment_id = %id, "generated new equipment id");
    Ok(id)
}

/// Forget the device id; the next [`equipment_id`] call makes a new one.
pub fn reset_equipment_id(store: &LocalStore) -> Result<(), StoreError> {
    store.remove(EQUIPMENT_ID_KEY)?;
    Ok(())
}
