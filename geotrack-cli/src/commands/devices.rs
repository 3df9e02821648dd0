//! Device registry management commands.
//!
//! These operate directly on the persisted registry; a running tracking
//! session picks changes up the next time it loads the registry.

use clap::Subcommand;
use geotrack::device::{DeviceStore, JsonDeviceStore};

use crate::error::CliError;

/// Device registry actions.
#[derive(Debug, Subcommand)]
pub enum DeviceAction {
    /// List registered devices
    List,
    /// Register a new device
    Create {
        /// Device name (e.g. "iPhone 14", "Car GPS")
        name: String,
    },
    /// Delete a device by id
    Delete {
        /// Device id to delete
        id: String,
    },
}

/// Run a device registry action.
pub fn run(action: DeviceAction) -> Result<(), CliError> {
    let store = JsonDeviceStore::new();
    let mut registry = store.load();

    match action {
        DeviceAction::List => {
            for device in registry.devices() {
                let marker = if device.id == registry.current_id() {
                    "*"
                } else {
                    " "
                };
                println!("{} {}  {}", marker, device.id, device.name);
            }
        }
        DeviceAction::Create { name } => {
            let device = registry.create(name);
            println!("Created {} ({})", device.id, device.name);
            store.save(&registry)?;
        }
        DeviceAction::Delete { id } => {
            registry
                .delete(&id)
                .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
            println!("Deleted {}", id);
            store.save(&registry)?;
        }
    }

    Ok(())
}
