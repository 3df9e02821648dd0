//! Trajectory synchronization.
//!
//! Everything that talks to (or coordinates talking to) the prediction
//! service lives here:
//!
//! - [`point`] - [`TrajectoryPoint`] wire type and ordering convention
//! - [`client`] - [`TrajectoryClient`] trait and the HTTP implementation
//! - [`state`] - [`SharedSyncState`] observable per-device state
//! - [`scheduler`] - [`AutoSendScheduler`] periodic forced transmission
//! - [`orchestrator`] - [`SyncOrchestrator`] event loop tying it together
//! - [`error`] - [`SyncError`]
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use geotrack::device::{DeviceRegistry, JsonDeviceStore, DeviceStore};
//! use geotrack::position::{FeedOptions, UdpLocationFeed};
//! use geotrack::sync::{Cadence, HttpTrajectoryClient, SyncOrchestrator};
//!
//! let client = Arc::new(HttpTrajectoryClient::new("http://localhost:8080/api")?);
//! let store = JsonDeviceStore::new();
//! let registry = store.load();
//!
//! let orchestrator = SyncOrchestrator::new(
//!     client,
//!     || UdpLocationFeed::new(47999),
//!     FeedOptions::default(),
//!     registry,
//!     Box::new(store),
//! );
//! let handle = orchestrator.handle();
//! let state = orchestrator.shared_state();
//!
//! let cancellation = CancellationToken::new();
//! tokio::spawn(orchestrator.run(cancellation.clone()));
//!
//! handle.start_tracking().await?;
//! handle.set_cadence(Cadence::Secs10).await?;
//! ```

pub mod client;
pub mod error;
pub mod orchestrator;
pub mod point;
pub mod scheduler;
pub mod state;

pub use client::{HttpTrajectoryClient, PredictionResponse, TrajectoryClient, DEFAULT_BASE_URL};
pub use error::SyncError;
pub use orchestrator::{Command, SyncHandle, SyncOrchestrator};
pub use point::TrajectoryPoint;
pub use scheduler::{AutoSendScheduler, Cadence};
pub use state::{SharedSyncState, SyncSnapshot};
