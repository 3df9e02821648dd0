//! Device registry persistence.
//!
//! The registry is serialized as a plain JSON array of devices under a
//! single file, rewritten on every mutation. A missing or corrupt file falls
//! back to the default single-device registry rather than failing startup.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::registry::{Device, DeviceRegistry};

/// File name holding the persisted registry.
pub const DEVICES_FILE: &str = "devices.json";

/// Persistence errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to create the data directory.
    #[error("Failed to create data directory: {0}")]
    DirectoryError(std::io::Error),

    /// Failed to write the registry file.
    #[error("Failed to write device registry: {0}")]
    WriteError(std::io::Error),

    /// Failed to serialize the registry.
    #[error("Failed to serialize device registry: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// Trait for loading and saving the device registry.
pub trait DeviceStore: Send {
    /// Load the registry, falling back to defaults when nothing usable is
    /// persisted.
    fn load(&self) -> DeviceRegistry;

    /// Persist the registry's device list.
    fn save(&self, registry: &DeviceRegistry) -> Result<(), StoreError>;
}

/// JSON file-backed device store.
#[derive(Debug, Clone)]
pub struct JsonDeviceStore {
    path: PathBuf,
}

impl JsonDeviceStore {
    /// Store at the default location (`~/.geotrack/devices.json`).
    pub fn new() -> Self {
        Self::at_path(data_directory().join(DEVICES_FILE))
    }

    /// Store at a specific path.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for JsonDeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceStore for JsonDeviceStore {
    fn load(&self) -> DeviceRegistry {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No persisted registry, using defaults");
                return DeviceRegistry::default();
            }
        };

        match serde_json::from_str::<Vec<Device>>(&contents) {
            Ok(devices) => DeviceRegistry::new(devices),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Corrupt device registry, using defaults");
                DeviceRegistry::default()
            }
        }
    }

    fn save(&self, registry: &DeviceRegistry) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(StoreError::DirectoryError)?;
        }

        let contents = serde_json::to_string_pretty(registry.devices())?;
        std::fs::write(&self.path, contents).map_err(StoreError::WriteError)?;
        debug!(path = %self.path.display(), devices = registry.devices().len(), "Device registry saved");
        Ok(())
    }
}

/// Per-user data directory (`~/.geotrack`).
pub fn data_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".geotrack")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDeviceStore::at_path(dir.path().join("devices.json"));

        let registry = store.load();
        assert_eq!(registry.current().id, "device42");
    }

    #[test]
    fn test_load_corrupt_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = JsonDeviceStore::at_path(&path);
        let registry = store.load();
        assert_eq!(registry.current().id, "device42");
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDeviceStore::at_path(dir.path().join("devices.json"));

        let mut registry = DeviceRegistry::default();
        registry.create("Car GPS");
        store.save(&registry).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.devices().len(), 2);
        assert_eq!(loaded.devices()[1].name, "Car GPS");
        // Current selection is not persisted; the first entry wins on load.
        assert_eq!(loaded.current_id(), registry.devices()[0].id);
    }

    #[test]
    fn test_save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDeviceStore::at_path(dir.path().join("nested").join("devices.json"));

        store.save(&DeviceRegistry::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_persisted_shape_is_plain_array() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonDeviceStore::at_path(dir.path().join("devices.json"));
        store.save(&DeviceRegistry::default()).unwrap();

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let array = value.as_array().expect("Registry persists as an array");
        assert_eq!(array[0]["id"], "device42");
        assert!(array[0]["createdAt"].is_i64());
    }
}
