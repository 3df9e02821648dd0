//! Synchronization orchestrator.
//!
//! The orchestrator composes the position source, movement filter, auto-send
//! scheduler, starting point manager, device registry and trajectory client
//! into one event loop. All state mutation happens inside that loop; the
//! outside world talks to it through a [`SyncHandle`] and observes it
//! through [`SharedSyncState`].
//!
//! # Event sources
//!
//! - control commands from [`SyncHandle`]
//! - position fixes and faults from the [`PositionSource`] subscription
//! - auto-send ticks from the [`AutoSendScheduler`]
//! - completions of spawned network round-trips
//!
//! # Sessions and stale responses
//!
//! Network calls are spawned, not awaited in the loop, so two round-trips
//! can overlap and complete out of order. Every spawned call carries the
//! *session epoch* current at issue time; the epoch is bumped whenever the
//! current device changes. A completion whose epoch no longer matches is
//! discarded silently — a pending fetch for the previous device can never
//! overwrite the new device's state.
//!
//! # Trajectory ownership
//!
//! The service is the sole source of truth for trajectory contents. A
//! successful submit replaces the probability and then refreshes the
//! trajectory with a fetch; the just-sent point is never appended locally.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::anchor::StartingPointManager;
use crate::device::{DeviceRegistry, DeviceStore};
use crate::position::{
    significant_movement, FeedOptions, LocationFeed, Position, PositionEvent, PositionSource,
};

use super::client::TrajectoryClient;
use super::error::SyncError;
use super::point::TrajectoryPoint;
use super::scheduler::{AutoSendScheduler, Cadence};
use super::state::SharedSyncState;

/// Simulated points scatter up to this far (per axis, degrees) around the
/// growth origin.
const SIMULATION_JITTER_DEG: f64 = 0.001;

/// Control messages accepted by the orchestrator.
#[derive(Debug, Clone)]
pub enum Command {
    /// Begin the position subscription.
    StartTracking,
    /// End the position subscription and cancel the auto-send timer.
    StopTracking,
    /// Select the auto-send cadence.
    SetCadence(Cadence),
    /// Anchor the starting point to the current live fix.
    SetStartFromLivePosition,
    /// Anchor the starting point to a trusted coordinate (map pick).
    SetStartFromPick { lat: f64, lon: f64 },
    /// Anchor the starting point from manually entered text.
    SetStartFromManualEntry { lat: String, lon: String },
    /// Remove the starting point.
    ClearStartingPoint,
    /// Transmit the current fix now, regardless of movement significance.
    SendCurrentPosition,
    /// Synthesize a point near the trajectory head (or starting point) and
    /// submit it.
    AddSimulatedPoint,
    /// Make another registered device current.
    SwitchDevice(String),
    /// Register a new device and make it current.
    CreateDevice(String),
    /// Remove a device from the registry.
    DeleteDevice(String),
    /// Stop the orchestrator loop.
    Shutdown,
}

/// Completion of a spawned network call, tagged with the session epoch it
/// was issued under.
#[derive(Debug)]
enum Outcome {
    /// Submit succeeded (probability) and the follow-up fetch completed.
    RoundTrip {
        epoch: u64,
        device_id: String,
        probability: f64,
        fetch: Result<Vec<TrajectoryPoint>, SyncError>,
    },
    /// Submit itself failed; no fetch was attempted.
    SubmitFailed {
        epoch: u64,
        device_id: String,
        error: SyncError,
    },
    /// Device-change trajectory reload completed.
    Reload {
        epoch: u64,
        device_id: String,
        result: Result<Vec<TrajectoryPoint>, SyncError>,
    },
}

/// Cloneable control handle for a running orchestrator.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<Command>,
}

impl SyncHandle {
    /// Send a raw command.
    pub async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::ChannelClosed)
    }

    pub async fn start_tracking(&self) -> Result<(), SyncError> {
        self.send(Command::StartTracking).await
    }

    pub async fn stop_tracking(&self) -> Result<(), SyncError> {
        self.send(Command::StopTracking).await
    }

    pub async fn set_cadence(&self, cadence: Cadence) -> Result<(), SyncError> {
        self.send(Command::SetCadence(cadence)).await
    }

    pub async fn send_current_position(&self) -> Result<(), SyncError> {
        self.send(Command::SendCurrentPosition).await
    }

    pub async fn add_simulated_point(&self) -> Result<(), SyncError> {
        self.send(Command::AddSimulatedPoint).await
    }

    pub async fn switch_device(&self, id: impl Into<String>) -> Result<(), SyncError> {
        self.send(Command::SwitchDevice(id.into())).await
    }

    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(Command::Shutdown).await
    }
}

/// The synchronization engine event loop.
///
/// Create with [`SyncOrchestrator::new`], grab the [`SyncHandle`] and
/// [`SharedSyncState`], then drive it with [`run`](SyncOrchestrator::run).
pub struct SyncOrchestrator<C, F>
where
    C: TrajectoryClient + 'static,
    F: LocationFeed,
{
    client: Arc<C>,
    source: PositionSource<F>,
    position_rx: mpsc::Receiver<PositionEvent>,
    scheduler: AutoSendScheduler,
    tick_rx: mpsc::Receiver<()>,
    command_tx: mpsc::Sender<Command>,
    command_rx: mpsc::Receiver<Command>,
    outcome_tx: mpsc::Sender<Outcome>,
    outcome_rx: mpsc::Receiver<Outcome>,
    registry: DeviceRegistry,
    store: Box<dyn DeviceStore>,
    anchor: StartingPointManager,
    shared: Arc<SharedSyncState>,
    cadence: Cadence,
    tracking: bool,
    current_fix: Option<Position>,
    epoch: u64,
}

impl<C, F> SyncOrchestrator<C, F>
where
    C: TrajectoryClient + 'static,
    F: LocationFeed,
{
    /// Build an orchestrator over a trajectory client and a location feed
    /// factory.
    pub fn new(
        client: Arc<C>,
        feed_factory: impl Fn() -> F + Send + Sync + 'static,
        feed_options: FeedOptions,
        registry: DeviceRegistry,
        store: Box<dyn DeviceStore>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(32);
        let (position_tx, position_rx) = mpsc::channel(32);
        let (tick_tx, tick_rx) = mpsc::channel(8);
        let (outcome_tx, outcome_rx) = mpsc::channel(32);

        let source = PositionSource::new(feed_factory, feed_options, position_tx);
        let scheduler = AutoSendScheduler::new(tick_tx);
        let shared = SharedSyncState::new(registry.current_id());

        Self {
            client,
            source,
            position_rx,
            scheduler,
            tick_rx,
            command_tx,
            command_rx,
            outcome_tx,
            outcome_rx,
            registry,
            store,
            anchor: StartingPointManager::new(),
            shared,
            cadence: Cadence::Off,
            tracking: false,
            current_fix: None,
            epoch: 0,
        }
    }

    /// Control handle for this orchestrator.
    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            command_tx: self.command_tx.clone(),
        }
    }

    /// Observable state for the current device.
    pub fn shared_state(&self) -> Arc<SharedSyncState> {
        Arc::clone(&self.shared)
    }

    /// Run the event loop until shut down or cancelled.
    ///
    /// Performs the initial trajectory load for the current device, then
    /// multiplexes commands, position events, scheduler ticks and network
    /// completions onto this single task.
    pub async fn run(mut self, cancellation: CancellationToken) {
        info!(device = %self.registry.current_id(), "Sync orchestrator started");
        self.reload_current_device();

        loop {
            tokio::select! {
                biased;

                _ = cancellation.cancelled() => {
                    info!("Sync orchestrator cancelled");
                    break;
                }

                Some(command) = self.command_rx.recv() => {
                    if matches!(command, Command::Shutdown) {
                        info!("Sync orchestrator shutting down");
                        break;
                    }
                    self.handle_command(command);
                }

                Some(event) = self.position_rx.recv() => {
                    self.handle_position_event(event);
                }

                Some(()) = self.tick_rx.recv() => {
                    self.handle_tick();
                }

                Some(outcome) = self.outcome_rx.recv() => {
                    self.apply_outcome(outcome);
                }
            }
        }

        self.scheduler.disarm();
        self.source.stop();
        info!("Sync orchestrator stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartTracking => self.start_tracking(),
            Command::StopTracking => self.stop_tracking(),
            Command::SetCadence(cadence) => self.set_cadence(cadence),
            Command::SetStartFromLivePosition => {
                match self.anchor.set_from_live_position(self.current_fix.as_ref()) {
                    Ok(_) => self.publish_anchor(None),
                    Err(e) => self.publish_anchor(Some(e.to_string())),
                }
            }
            Command::SetStartFromPick { lat, lon } => {
                self.anchor.set_from_pick(lat, lon);
                // A pick resolves whatever complaint was showing.
                self.shared.update(|s| s.last_error = None);
                self.publish_anchor(None);
            }
            Command::SetStartFromManualEntry { lat, lon } => {
                match self.anchor.set_from_manual_entry(&lat, &lon) {
                    Ok(_) => self.publish_anchor(None),
                    Err(e) => self.publish_anchor(Some(e.to_string())),
                }
            }
            Command::ClearStartingPoint => {
                self.anchor.clear();
                self.publish_anchor(None);
            }
            Command::SendCurrentPosition => self.send_current_position(),
            Command::AddSimulatedPoint => self.add_simulated_point(),
            Command::SwitchDevice(id) => self.switch_device(&id),
            Command::CreateDevice(name) => self.create_device(name),
            Command::DeleteDevice(id) => self.delete_device(&id),
            Command::Shutdown => unreachable!("handled by the run loop"),
        }
    }

    fn start_tracking(&mut self) {
        self.source.start();
        self.tracking = true;
        self.shared.update(|s| {
            s.tracking = true;
            s.last_error = None;
        });
        if self.cadence != Cadence::Off {
            self.scheduler.arm(self.cadence);
        }
    }

    fn stop_tracking(&mut self) {
        self.scheduler.disarm();
        self.source.stop();
        self.tracking = false;
        self.shared.update(|s| s.tracking = false);
    }

    fn set_cadence(&mut self, cadence: Cadence) {
        self.cadence = cadence;
        if self.tracking && cadence != Cadence::Off {
            self.scheduler.arm(cadence);
        } else {
            self.scheduler.disarm();
        }
    }

    fn publish_anchor(&self, error: Option<String>) {
        let anchor = self.anchor.get();
        self.shared.update(|s| {
            s.starting_point = anchor;
            if let Some(message) = error {
                s.last_error = Some(message);
            }
        });
    }

    fn send_current_position(&mut self) {
        match self.current_fix {
            Some(fix) => self.spawn_round_trip(TrajectoryPoint::from(&fix)),
            None => self.shared.update(|s| {
                s.last_error = Some(
                    "No GPS position available. Please start GPS tracking first.".to_string(),
                )
            }),
        }
    }

    fn add_simulated_point(&mut self) {
        let origin = self
            .shared
            .snapshot()
            .head()
            .map(|p| p.coords())
            .or_else(|| self.anchor.get().map(|a| a.coords()));

        match origin {
            Some(origin) => {
                let point = jitter_around(origin);
                debug!(
                    origin_lat = origin.0,
                    origin_lon = origin.1,
                    lat = point.lat,
                    lon = point.lon,
                    "Simulated point"
                );
                self.spawn_round_trip(point);
            }
            None => {
                // Rejected locally; the service is never asked to
                // extrapolate from nothing.
                self.shared
                    .update(|s| s.last_error = Some(SyncError::NoOriginPoint.to_string()));
            }
        }
    }

    fn switch_device(&mut self, id: &str) {
        match self.registry.switch(id) {
            Ok(_) => self.begin_device_session(),
            Err(e) => self.shared.update(|s| s.last_error = Some(e.to_string())),
        }
    }

    fn create_device(&mut self, name: String) {
        self.registry.create(name);
        self.persist_registry();
        self.begin_device_session();
    }

    fn delete_device(&mut self, id: &str) {
        match self.registry.delete(id) {
            Ok(current_changed) => {
                self.persist_registry();
                if current_changed {
                    self.begin_device_session();
                }
            }
            Err(e) => self.shared.update(|s| s.last_error = Some(e.to_string())),
        }
    }

    /// Reset per-device state after the current device changed.
    ///
    /// Bumping the epoch orphans every in-flight network call issued for the
    /// previous device; their completions will be discarded.
    fn begin_device_session(&mut self) {
        self.epoch += 1;
        self.scheduler.disarm();

        let device_id = self.registry.current_id().to_string();
        info!(device = %device_id, "Current device changed");

        self.shared.update(|s| {
            s.device_id = device_id;
            s.trajectory.clear();
            s.probability = 0.0;
            s.last_sent = None;
            s.last_error = None;
            s.loading = false;
        });

        self.reload_current_device();

        if self.tracking && self.cadence != Cadence::Off {
            self.scheduler.arm(self.cadence);
        }
    }

    fn persist_registry(&self) {
        if let Err(e) = self.store.save(&self.registry) {
            warn!(error = %e, "Failed to persist device registry");
        }
    }

    fn handle_position_event(&mut self, event: PositionEvent) {
        match event {
            Ok(position) => {
                self.current_fix = Some(position);
                if !self.tracking {
                    return;
                }

                let candidate = position.coords();
                let last = self.shared.snapshot().last_sent;
                if significant_movement(last, candidate) {
                    self.shared.update(|s| s.last_sent = Some(candidate));
                    self.spawn_round_trip(TrajectoryPoint::from(&position));
                } else {
                    debug!(
                        lat = candidate.0,
                        lon = candidate.1,
                        "Fix within jitter threshold, not sent"
                    );
                }
            }
            Err(fault) => {
                // The source has already stopped itself; mirror that here
                // and make sure no timer keeps firing against a dead feed.
                info!(fault = %fault, "Position feed fault, tracking stopped");
                self.scheduler.disarm();
                self.source.stop();
                self.tracking = false;
                self.shared.update(|s| {
                    s.tracking = false;
                    s.last_error = Some(fault.to_string());
                });
            }
        }
    }

    fn handle_tick(&mut self) {
        if !self.tracking {
            return;
        }
        match self.current_fix {
            Some(fix) => {
                debug!("Auto-send tick");
                self.spawn_round_trip(TrajectoryPoint::from(&fix));
            }
            None => debug!("Auto-send tick skipped, no fix yet"),
        }
    }

    /// Submit a point and refresh the trajectory, off the loop task.
    fn spawn_round_trip(&self, point: TrajectoryPoint) {
        let client = Arc::clone(&self.client);
        let device_id = self.registry.current_id().to_string();
        let epoch = self.epoch;
        let outcome_tx = self.outcome_tx.clone();

        self.shared.update(|s| {
            s.loading = true;
            s.last_error = None;
        });

        tokio::spawn(async move {
            match client.submit(&device_id, &point).await {
                Ok(probability) => {
                    let fetch = client.fetch_latest(&device_id).await;
                    let _ = outcome_tx
                        .send(Outcome::RoundTrip {
                            epoch,
                            device_id,
                            probability,
                            fetch,
                        })
                        .await;
                }
                Err(error) => {
                    let _ = outcome_tx
                        .send(Outcome::SubmitFailed {
                            epoch,
                            device_id,
                            error,
                        })
                        .await;
                }
            }
        });
    }

    /// Fetch the authoritative trajectory for the (new) current device.
    fn reload_current_device(&self) {
        let client = Arc::clone(&self.client);
        let device_id = self.registry.current_id().to_string();
        let epoch = self.epoch;
        let outcome_tx = self.outcome_tx.clone();

        self.shared.update(|s| s.loading = true);

        tokio::spawn(async move {
            let result = client.fetch_latest(&device_id).await;
            let _ = outcome_tx
                .send(Outcome::Reload {
                    epoch,
                    device_id,
                    result,
                })
                .await;
        });
    }

    fn apply_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::RoundTrip {
                epoch,
                device_id,
                probability,
                fetch,
            } => {
                if epoch != self.epoch {
                    debug!(device = %device_id, "Discarding stale round-trip response");
                    return;
                }
                self.shared.update(|s| {
                    s.probability = probability;
                    s.loading = false;
                    match fetch {
                        Ok(points) => s.trajectory = points,
                        // Trajectory stays as-is; only the error surfaces.
                        Err(e) => s.last_error = Some(e.to_string()),
                    }
                });
            }
            Outcome::SubmitFailed {
                epoch,
                device_id,
                error,
            } => {
                if epoch != self.epoch {
                    debug!(device = %device_id, "Discarding stale submit failure");
                    return;
                }
                warn!(device = %device_id, error = %error, "Trajectory submit failed");
                self.shared.update(|s| {
                    s.loading = false;
                    s.last_error = Some(error.to_string());
                });
            }
            Outcome::Reload {
                epoch,
                device_id,
                result,
            } => {
                if epoch != self.epoch {
                    debug!(device = %device_id, "Discarding stale trajectory reload");
                    return;
                }
                match result {
                    Ok(points) => self.shared.update(|s| {
                        s.loading = false;
                        s.trajectory = points;
                    }),
                    Err(e) => {
                        warn!(device = %device_id, error = %e, "Trajectory reload failed");
                        self.shared.update(|s| {
                            s.loading = false;
                            s.trajectory = Vec::new();
                        });
                    }
                }
            }
        }
    }
}

/// Synthesize a point near the origin with small uniform jitter.
fn jitter_around(origin: (f64, f64)) -> TrajectoryPoint {
    let mut rng = rand::thread_rng();
    TrajectoryPoint::now(
        origin.0 + (rng.gen::<f64>() - 0.5) * SIMULATION_JITTER_DEG,
        origin.1 + (rng.gen::<f64>() - 0.5) * SIMULATION_JITTER_DEG,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_bounds() {
        for _ in 0..100 {
            let point = jitter_around((53.5, 10.0));
            assert!((point.lat - 53.5).abs() <= SIMULATION_JITTER_DEG / 2.0);
            assert!((point.lon - 10.0).abs() <= SIMULATION_JITTER_DEG / 2.0);
            assert!(point.timestamp.is_some());
        }
    }
}
