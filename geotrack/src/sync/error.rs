//! Error types for trajectory synchronization.

use thiserror::Error;

/// Errors that can occur when synchronizing with the prediction service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The HTTP request failed: transport error, timeout, or non-2xx status.
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a body we could not parse.
    #[error("Failed to parse response: {0}")]
    InvalidResponse(String),

    /// A simulated point was requested with neither trajectory history nor
    /// a starting point to grow from.
    #[error("Please set a starting point first, or use GPS tracking to get your current location.")]
    NoOriginPoint,

    /// The orchestrator is no longer running.
    #[error("Synchronization engine is shut down")]
    ChannelClosed,
}
