//! Observable synchronization state.
//!
//! [`SharedSyncState`] is the thread-safe view the orchestrator publishes
//! for the current device: trajectory, probability, loading flag and the
//! last surfaced error. Consumers (CLI status line, dashboards) take cheap
//! snapshots; all mutation happens inside the orchestrator loop.

use std::sync::{Arc, RwLock};

use crate::anchor::StartingPoint;

use super::point::TrajectoryPoint;

/// Snapshot of the synchronization state for the current device.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    /// Id of the device this state belongs to.
    pub device_id: String,

    /// Whether position tracking is active.
    pub tracking: bool,

    /// Authoritative trajectory, most-recent-first. Replaced wholesale from
    /// fetch responses, never appended to locally.
    pub trajectory: Vec<TrajectoryPoint>,

    /// Latest intrusion probability from the service, in `[0, 1]`.
    pub probability: f64,

    /// Last position transmitted through the movement filter.
    pub last_sent: Option<(f64, f64)>,

    /// Whether a submit/fetch round-trip is in flight.
    pub loading: bool,

    /// Last user-visible error, if any.
    pub last_error: Option<String>,

    /// The configured starting point anchor, if any.
    pub starting_point: Option<StartingPoint>,
}

impl SyncSnapshot {
    /// The newest trajectory point, if any.
    pub fn head(&self) -> Option<&TrajectoryPoint> {
        self.trajectory.first()
    }
}

/// Thread-safe wrapper around the current device's sync state.
#[derive(Debug, Default)]
pub struct SharedSyncState {
    inner: RwLock<SyncSnapshot>,
}

impl SharedSyncState {
    /// Create shared state for the given device.
    pub fn new(device_id: impl Into<String>) -> Arc<Self> {
        let snapshot = SyncSnapshot {
            device_id: device_id.into(),
            ..Default::default()
        };
        Arc::new(Self {
            inner: RwLock::new(snapshot),
        })
    }

    /// Take a snapshot of the full state.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Current probability.
    pub fn probability(&self) -> f64 {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .probability
    }

    /// Whether a network round-trip is in flight.
    pub fn is_loading(&self) -> bool {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).loading
    }

    /// Apply a mutation. Orchestrator-internal.
    pub(crate) fn update(&self, f: impl FnOnce(&mut SyncSnapshot)) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut inner);
    }
}
