//! GeoTrack - trajectory tracking and synchronization engine.
//!
//! This library continuously observes a moving device's position, decides
//! which fixes are worth transmitting, sends them to a remote trajectory /
//! intrusion-prediction service, and reconciles the authoritative trajectory
//! and probability back into local, observable state.
//!
//! # Architecture
//!
//! - [`position`] - push-based position subscription, faults, jitter filter
//! - [`anchor`] - optional starting-point coordinate seeding simulation
//! - [`device`] - device registry (never empty) and its persistence
//! - [`sync`] - service client, auto-send scheduler and the orchestrator
//!   event loop that ties everything together
//!
//! The service is the sole source of truth for trajectory contents: the
//! client submits points and then re-fetches, it never grows the trajectory
//! locally.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use geotrack::device::{DeviceStore, JsonDeviceStore};
//! use geotrack::position::{FeedOptions, UdpLocationFeed};
//! use geotrack::sync::{HttpTrajectoryClient, SyncOrchestrator};
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
//! tokio::spawn(orchestrator.run(CancellationToken::new()));
//! handle.start_tracking().await?;
//! ```

pub mod anchor;
pub mod device;
pub mod logging;
pub mod position;
pub mod sync;

/// Version of the GeoTrack library and CLI.
///
/// Synchronized across the workspace; defined in `Cargo.toml` and injected
/// at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
