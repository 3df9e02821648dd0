//! Device registry - the set of tracked devices and the current selection.
//!
//! The registry is a non-empty ordered collection; exactly one device is
//! current at any time. Deleting the last remaining device is a policy
//! violation, so there is always a device to track against.

use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Id of the device the registry falls back to when nothing is persisted.
pub const DEFAULT_DEVICE_ID: &str = "device42";

/// Name of the fallback device.
pub const DEFAULT_DEVICE_NAME: &str = "Default Device";

/// A tracked device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Opaque unique id.
    pub id: String,

    /// Human-readable name.
    pub name: String,

    /// Creation time (epoch milliseconds).
    pub created_at: i64,
}

impl Device {
    /// Create a device with a freshly generated id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: generate_device_id(),
            name: name.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    fn default_device() -> Self {
        Self {
            id: DEFAULT_DEVICE_ID.to_string(),
            name: DEFAULT_DEVICE_NAME.to_string(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Generate an opaque device id: `device-<epoch-millis>-<9 alphanumerics>`.
fn generate_device_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    format!("device-{}-{}", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Errors from registry mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Deleting the sole remaining device would empty the registry.
    #[error("Cannot delete the last device")]
    CannotDeleteLastDevice,

    /// The referenced device id is not in the registry.
    #[error("Unknown device: {0}")]
    UnknownDevice(String),
}

/// Non-empty ordered device collection with a current selection.
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    current: String,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(vec![Device::default_device()])
    }
}

impl DeviceRegistry {
    /// Build a registry from a device list.
    ///
    /// An empty list falls back to the default device; the first entry
    /// becomes current.
    pub fn new(devices: Vec<Device>) -> Self {
        let devices = if devices.is_empty() {
            vec![Device::default_device()]
        } else {
            devices
        };
        let current = devices[0].id.clone();
        Self { devices, current }
    }

    /// All devices, in registry order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// The current device.
    pub fn current(&self) -> &Device {
        // The registry is never empty and `current` always refers to a member.
        self.devices
            .iter()
            .find(|d| d.id == self.current)
            .unwrap_or(&self.devices[0])
    }

    /// Id of the current device.
    pub fn current_id(&self) -> &str {
        &self.current
    }

    /// Look up a device by id.
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Create a device and make it current.
    pub fn create(&mut self, name: impl Into<String>) -> &Device {
        let device = Device::new(name);
        tracing::info!(id = %device.id, name = %device.name, "Device created");
        self.current = device.id.clone();
        self.devices.push(device);
        // Just pushed.
        self.devices.last().unwrap()
    }

    /// Switch the current device.
    pub fn switch(&mut self, id: &str) -> Result<&Device, DeviceError> {
        if self.get(id).is_none() {
            return Err(DeviceError::UnknownDevice(id.to_string()));
        }
        self.current = id.to_string();
        Ok(self.current())
    }

    /// Delete a device.
    ///
    /// Rejected when it would empty the registry. When the current device is
    /// deleted, the first remaining device becomes current. Returns whether
    /// the current selection changed.
    pub fn delete(&mut self, id: &str) -> Result<bool, DeviceError> {
        if self.devices.len() <= 1 {
            return Err(DeviceError::CannotDeleteLastDevice);
        }
        if self.get(id).is_none() {
            return Err(DeviceError::UnknownDevice(id.to_string()));
        }

        self.devices.retain(|d| d.id != id);
        tracing::info!(id, "Device deleted");

        if self.current == id {
            self.current = self.devices[0].id.clone();
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry() {
        let registry = DeviceRegistry::default();
        assert_eq!(registry.devices().len(), 1);
        assert_eq!(registry.current().id, DEFAULT_DEVICE_ID);
        assert_eq!(registry.current().name, DEFAULT_DEVICE_NAME);
    }

    #[test]
    fn test_empty_list_falls_back_to_default() {
        let registry = DeviceRegistry::new(vec![]);
        assert_eq!(registry.current().id, DEFAULT_DEVICE_ID);
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate_device_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 9);
    }

    #[test]
    fn test_create_switches_current() {
        let mut registry = DeviceRegistry::default();
        let id = registry.create("Car GPS").id.clone();
        assert_eq!(registry.devices().len(), 2);
        assert_eq!(registry.current_id(), id);
    }

    #[test]
    fn test_switch() {
        let mut registry = DeviceRegistry::default();
        let id = registry.create("Phone").id.clone();
        registry.switch(DEFAULT_DEVICE_ID).unwrap();
        assert_eq!(registry.current_id(), DEFAULT_DEVICE_ID);
        registry.switch(&id).unwrap();
        assert_eq!(registry.current_id(), id);
    }

    #[test]
    fn test_switch_unknown() {
        let mut registry = DeviceRegistry::default();
        assert!(matches!(
            registry.switch("nope"),
            Err(DeviceError::UnknownDevice(_))
        ));
        assert_eq!(registry.current_id(), DEFAULT_DEVICE_ID);
    }

    #[test]
    fn test_delete_last_device_rejected() {
        let mut registry = DeviceRegistry::default();
        let result = registry.delete(DEFAULT_DEVICE_ID);
        assert_eq!(result, Err(DeviceError::CannotDeleteLastDevice));
        assert_eq!(registry.devices().len(), 1, "Registry must be unchanged");
    }

    #[test]
    fn test_delete_current_switches_to_remaining() {
        let mut registry = DeviceRegistry::default();
        let id = registry.create("Phone").id.clone();
        assert_eq!(registry.current_id(), id);

        let changed = registry.delete(&id).unwrap();
        assert!(changed);
        assert_eq!(registry.current_id(), DEFAULT_DEVICE_ID);
        assert_eq!(registry.devices().len(), 1);
    }

    #[test]
    fn test_delete_other_keeps_current() {
        let mut registry = DeviceRegistry::default();
        let id = registry.create("Phone").id.clone();

        let changed = registry.delete(DEFAULT_DEVICE_ID).unwrap();
        assert!(!changed);
        assert_eq!(registry.current_id(), id);
    }

    #[test]
    fn test_device_serde_uses_camel_case() {
        let device = Device {
            id: "device42".to_string(),
            name: "Default Device".to_string(),
            created_at: 1700000000000,
        };
        let json = serde_json::to_string(&device).unwrap();
        assert!(json.contains("\"createdAt\":1700000000000"));

        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, device);
    }
}
