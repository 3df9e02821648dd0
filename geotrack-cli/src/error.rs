//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use geotrack::device::StoreError;
use geotrack::sync::SyncError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Failed to build the service client
    ClientSetup(SyncError),
    /// Failed to persist the device registry
    Store(StoreError),
    /// The synchronization engine stopped unexpectedly
    Engine(SyncError),
    /// Failed to create the Tokio runtime
    Runtime(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ClientSetup(_) | CliError::Engine(_) => {
                eprintln!();
                eprintln!("Make sure the prediction service is reachable, e.g.:");
                eprintln!("  geotrack run --server http://localhost:8080/api");
            }
            _ => {}
        }

        process::exit(1);
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Self::ClientSetup(e) => write!(f, "Failed to create service client: {}", e),
            Self::Store(e) => write!(f, "Device registry error: {}", e),
            Self::Engine(e) => write!(f, "Synchronization engine error: {}", e),
            Self::Runtime(msg) => write!(f, "Runtime error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ClientSetup(e) | Self::Engine(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
