//! Device registry and persistence.
//!
//! Devices scope trajectories on the prediction service: every submit and
//! fetch is keyed by a device id. The registry is never empty and always has
//! a current selection; [`store`] persists it across sessions.

pub mod registry;
pub mod store;

pub use registry::{Device, DeviceError, DeviceRegistry, DEFAULT_DEVICE_ID, DEFAULT_DEVICE_NAME};
pub use store::{data_directory, DeviceStore, JsonDeviceStore, StoreError, DEVICES_FILE};
