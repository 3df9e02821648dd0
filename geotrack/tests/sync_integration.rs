//! Integration tests for the synchronization engine.
//!
//! These tests drive the full orchestrator loop with a mock trajectory
//! client and a channel-backed position feed:
//! - movement filter → submit/fetch round-trips
//! - auto-send scheduler ticks and teardown
//! - starting point gating of the simulation path
//! - device switching, registry policy, and stale-response discarding
//!
//! Run with: `cargo test --test sync_integration`

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use geotrack::device::{Device, DeviceRegistry, DeviceStore, StoreError};
use geotrack::position::{FeedOptions, GeolocationFault, LocationFeed, Position, PositionEvent};
use geotrack::sync::{
    Cadence, Command, SharedSyncState, SyncError, SyncHandle, SyncOrchestrator, TrajectoryClient,
    TrajectoryPoint,
};

// ============================================================================
// Test Doubles
// ============================================================================

/// Recorded client call.
#[derive(Debug, Clone, PartialEq)]
enum Call {
    Submit(String, (f64, f64)),
    Fetch(String),
}

/// Mock trajectory client emulating the prediction service.
///
/// Submits prepend the point to the device's stored trajectory (the service
/// is most-recent-first) and return a configurable probability. Fetches can
/// be delayed per device to exercise out-of-order completions.
struct MockTrajectoryClient {
    calls: Mutex<Vec<Call>>,
    trajectories: Mutex<HashMap<String, Vec<TrajectoryPoint>>>,
    probability: Mutex<f64>,
    fail_submit: AtomicBool,
    fail_fetch: AtomicBool,
    fetch_delays: Mutex<HashMap<String, Duration>>,
}

impl MockTrajectoryClient {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            trajectories: Mutex::new(HashMap::new()),
            probability: Mutex::new(0.5),
            fail_submit: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fetch_delays: Mutex::new(HashMap::new()),
        })
    }

    fn set_probability(&self, p: f64) {
        *self.probability.lock().unwrap() = p;
    }

    fn seed_trajectory(&self, device_id: &str, points: Vec<TrajectoryPoint>) {
        self.trajectories
            .lock()
            .unwrap()
            .insert(device_id.to_string(), points);
    }

    fn delay_fetch(&self, device_id: &str, delay: Duration) {
        self.fetch_delays
            .lock()
            .unwrap()
            .insert(device_id.to_string(), delay);
    }

    fn submits(&self) -> Vec<(String, (f64, f64))> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Submit(id, coords) => Some((id.clone(), *coords)),
                _ => None,
            })
            .collect()
    }

    fn fetches(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                Call::Fetch(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }
}

impl TrajectoryClient for MockTrajectoryClient {
    async fn submit(&self, device_id: &str, point: &TrajectoryPoint) -> Result<f64, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Submit(device_id.to_string(), point.coords()));

        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(SyncError::RequestFailed("connection refused".to_string()));
        }

        self.trajectories
            .lock()
            .unwrap()
            .entry(device_id.to_string())
            .or_default()
            .insert(0, *point);

        Ok(*self.probability.lock().unwrap())
    }

    async fn fetch_latest(&self, device_id: &str) -> Result<Vec<TrajectoryPoint>, SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Fetch(device_id.to_string()));

        let delay = self.fetch_delays.lock().unwrap().get(device_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(SyncError::RequestFailed("connection refused".to_string()));
        }

        Ok(self
            .trajectories
            .lock()
            .unwrap()
            .get(device_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Feed backed by an in-process channel; hangs forever once the sender is
/// dropped so the per-fix timeout governs.
struct ChannelFeed {
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PositionEvent>>>,
}

impl LocationFeed for ChannelFeed {
    async fn next_fix(&mut self) -> Result<Position, GeolocationFault> {
        let mut rx = self.rx.lock().await;
        match rx.recv().await {
            Some(event) => event,
            None => std::future::pending().await,
        }
    }
}

/// Store that persists nothing.
struct NullStore;

impl DeviceStore for NullStore {
    fn load(&self) -> DeviceRegistry {
        DeviceRegistry::default()
    }

    fn save(&self, _registry: &DeviceRegistry) -> Result<(), StoreError> {
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    handle: SyncHandle,
    state: Arc<SharedSyncState>,
    feed_tx: mpsc::Sender<PositionEvent>,
    cancellation: CancellationToken,
}

impl Harness {
    fn spawn(client: Arc<MockTrajectoryClient>, registry: DeviceRegistry) -> Self {
        let (feed_tx, feed_rx) = mpsc::channel(32);
        let feed_rx = Arc::new(tokio::sync::Mutex::new(feed_rx));

        // Tests run on a paused clock; keep the fix timeout out of the way.
        let options = FeedOptions {
            fix_timeout: Duration::from_secs(24 * 3600),
            ..Default::default()
        };

        let orchestrator = SyncOrchestrator::new(
            client,
            move || ChannelFeed {
                rx: Arc::clone(&feed_rx),
            },
            options,
            registry,
            Box::new(NullStore),
        );
        let handle = orchestrator.handle();
        let state = orchestrator.shared_state();

        let cancellation = CancellationToken::new();
        tokio::spawn(orchestrator.run(cancellation.clone()));

        Self {
            handle,
            state,
            feed_tx,
            cancellation,
        }
    }

    async fn push_fix(&self, lat: f64, lon: f64) {
        self.feed_tx
            .send(Ok(Position::new(lat, lon)))
            .await
            .expect("Feed channel open");
        settle().await;
    }

    async fn push_fault(&self, fault: GeolocationFault) {
        self.feed_tx
            .send(Err(fault))
            .await
            .expect("Feed channel open");
        settle().await;
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Let the loop and any spawned round-trips run to completion.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn two_device_registry() -> DeviceRegistry {
    DeviceRegistry::new(vec![
        Device {
            id: "d1".to_string(),
            name: "First".to_string(),
            created_at: 1,
        },
        Device {
            id: "d2".to_string(),
            name: "Second".to_string(),
            created_at: 2,
        },
    ])
}

// ============================================================================
// Startup and Simulation Path
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_initial_load_fetches_current_device() {
    let client = MockTrajectoryClient::new();
    client.seed_trajectory("device42", vec![TrajectoryPoint::now(53.5, 10.0)]);

    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    assert_eq!(client.fetches(), vec!["device42".to_string()]);
    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.device_id, "device42");
    assert_eq!(snapshot.trajectory.len(), 1);
    assert!(!snapshot.loading);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_point_without_origin_rejected_locally() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.add_simulated_point().await.unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap()
        .contains("starting point"));
    assert!(client.submits().is_empty(), "Must not reach the network");
    // Only the startup reload hit the service.
    assert_eq!(client.fetches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_simulated_point_after_pick_round_trips() {
    let client = MockTrajectoryClient::new();
    client.set_probability(0.73);

    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness
        .handle
        .send(Command::SetStartFromPick {
            lat: 10.0,
            lon: 20.0,
        })
        .await
        .unwrap();
    harness.handle.add_simulated_point().await.unwrap();
    settle().await;

    let submits = client.submits();
    assert_eq!(submits.len(), 1);
    let (device, (lat, lon)) = &submits[0];
    assert_eq!(device, "device42");
    // Jitter is at most 0.0005 degrees per axis around the anchor.
    assert!((lat - 10.0).abs() <= 0.0005);
    assert!((lon - 20.0).abs() <= 0.0005);

    // Startup reload plus the post-submit refresh.
    assert_eq!(client.fetches().len(), 2);

    let snapshot = harness.state.snapshot();
    assert!((snapshot.probability - 0.73).abs() < f64::EPSILON);
    assert_eq!(snapshot.trajectory.len(), 1, "Refreshed from the service");
    assert!(snapshot.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_simulated_point_grows_from_trajectory_head() {
    let client = MockTrajectoryClient::new();
    client.seed_trajectory(
        "device42",
        vec![
            TrajectoryPoint::now(53.5, 10.0),
            TrajectoryPoint::now(40.0, -5.0),
        ],
    );

    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.add_simulated_point().await.unwrap();
    settle().await;

    // Grown from the head (newest) point, not the origin.
    let (_, (lat, lon)) = &client.submits()[0];
    assert!((lat - 53.5).abs() <= 0.0005);
    assert!((lon - 10.0).abs() <= 0.0005);
}

// ============================================================================
// Movement Filter Flow
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_movement_filter_gates_transmission() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    settle().await;
    assert!(harness.state.snapshot().tracking);

    // First observation is always significant.
    harness.push_fix(53.5, 10.0).await;
    // Within the jitter threshold on both axes: filtered.
    harness.push_fix(53.500002, 10.000002).await;
    // Beyond the threshold in latitude: sent.
    harness.push_fix(53.5001, 10.000002).await;

    let submits = client.submits();
    assert_eq!(submits.len(), 2);
    assert_eq!(submits[0].1, (53.5, 10.0));
    assert_eq!(submits[1].1, (53.5001, 10.000002));

    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.last_sent, Some((53.5001, 10.000002)));
}

#[tokio::test(start_paused = true)]
async fn test_fixes_ignored_while_not_tracking() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    // Tracking never started; a stray fix must not transmit.
    harness.push_fix(53.5, 10.0).await;
    assert!(client.submits().is_empty());
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_submit_failure_leaves_state_untouched() {
    let client = MockTrajectoryClient::new();
    client.set_probability(0.9);
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    harness.push_fix(53.5, 10.0).await;

    let before = harness.state.snapshot();
    assert_eq!(before.trajectory.len(), 1);
    assert!((before.probability - 0.9).abs() < f64::EPSILON);

    client.fail_submit.store(true, Ordering::SeqCst);
    harness.handle.send_current_position().await.unwrap();
    settle().await;

    let after = harness.state.snapshot();
    assert_eq!(after.trajectory.len(), 1, "Trajectory untouched on failure");
    assert!((after.probability - 0.9).abs() < f64::EPSILON);
    assert!(after.last_error.as_deref().unwrap().contains("Request failed"));
    assert!(!after.loading, "Loading cleared after failure");
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_after_submit_keeps_trajectory() {
    let client = MockTrajectoryClient::new();
    client.seed_trajectory("device42", vec![TrajectoryPoint::now(1.0, 1.0)]);
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    client.set_probability(0.42);
    client.fail_fetch.store(true, Ordering::SeqCst);
    harness.push_fix(53.5, 10.0).await;

    let snapshot = harness.state.snapshot();
    // Probability came back with the submit and is applied.
    assert!((snapshot.probability - 0.42).abs() < f64::EPSILON);
    // The refresh failed: existing trajectory stays, error surfaces.
    assert_eq!(snapshot.trajectory.len(), 1);
    assert_eq!(snapshot.trajectory[0].coords(), (1.0, 1.0));
    assert!(snapshot.last_error.is_some());
    assert!(!snapshot.loading);
}

// ============================================================================
// Auto-Send Scheduler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_auto_send_transmits_each_interval() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    // The fix itself is the first observation and transmits immediately.
    harness.push_fix(53.5, 10.0).await;
    assert_eq!(client.submits().len(), 1);

    harness.handle.set_cadence(Cadence::Secs5).await.unwrap();
    settle().await;

    // Three full periods: ticks at 5, 10 and 15 seconds.
    tokio::time::sleep(Duration::from_secs(16)).await;
    assert_eq!(client.submits().len(), 4);

    // Auto-sends bypass the filter: the position never moved.
    for (_, coords) in &client.submits()[1..] {
        assert_eq!(*coords, (53.5, 10.0));
    }

    // Clearing the cadence stops the timer.
    harness.handle.set_cadence(Cadence::Off).await.unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(client.submits().len(), 4, "Tick after cadence cleared");
}

#[tokio::test(start_paused = true)]
async fn test_stop_tracking_cancels_auto_send() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    harness.push_fix(53.5, 10.0).await;
    harness.handle.set_cadence(Cadence::Secs5).await.unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    let sent_while_tracking = client.submits().len();
    assert!(sent_while_tracking >= 2);

    harness.handle.stop_tracking().await.unwrap();
    settle().await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(
        client.submits().len(),
        sent_while_tracking,
        "Zero transmissions after tracking stopped"
    );
}

// ============================================================================
// Geolocation Faults
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_fault_stops_tracking_and_scheduler() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness.handle.start_tracking().await.unwrap();
    harness.push_fix(53.5, 10.0).await;
    harness.handle.set_cadence(Cadence::Secs5).await.unwrap();
    settle().await;

    let sent_before = client.submits().len();
    harness
        .push_fault(GeolocationFault::permission_denied())
        .await;

    let snapshot = harness.state.snapshot();
    assert!(!snapshot.tracking);
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Location permission denied. Please enable location access.")
    );

    // A leaked timer would keep transmitting the cached fix.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(client.submits().len(), sent_before);
}

// ============================================================================
// Device Switching and Registry Policy
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_device_switch_resets_state_and_reloads() {
    let client = MockTrajectoryClient::new();
    client.seed_trajectory("d1", vec![TrajectoryPoint::now(1.0, 1.0)]);
    client.seed_trajectory("d2", vec![]);
    client.set_probability(0.8);

    let harness = Harness::spawn(Arc::clone(&client), two_device_registry());
    settle().await;

    // Put some state on d1.
    harness.handle.start_tracking().await.unwrap();
    harness.push_fix(53.5, 10.0).await;
    let d1 = harness.state.snapshot();
    assert!((d1.probability - 0.8).abs() < f64::EPSILON);
    assert!(d1.last_sent.is_some());

    harness.handle.switch_device("d2").await.unwrap();
    settle().await;

    let d2 = harness.state.snapshot();
    assert_eq!(d2.device_id, "d2");
    assert_eq!(d2.probability, 0.0, "Probability reset on switch");
    assert!(d2.trajectory.is_empty(), "Empty result is valid for d2");
    assert!(d2.last_sent.is_none());
    assert!(client.fetches().contains(&"d2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_pending_fetch_for_previous_device_discarded() {
    let client = MockTrajectoryClient::new();
    client.seed_trajectory("d1", vec![TrajectoryPoint::now(1.0, 1.0)]);
    client.seed_trajectory("d2", vec![]);
    // d1's startup reload completes long after the switch to d2.
    client.delay_fetch("d1", Duration::from_secs(5));

    let harness = Harness::spawn(Arc::clone(&client), two_device_registry());

    // Switch before the d1 fetch can resolve.
    harness.handle.switch_device("d2").await.unwrap();
    settle().await;

    // Let the delayed d1 response arrive.
    tokio::time::sleep(Duration::from_secs(10)).await;

    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.device_id, "d2");
    assert!(
        snapshot.trajectory.is_empty(),
        "Stale d1 response must not overwrite d2 state"
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_last_device_rejected() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness
        .handle
        .send(Command::DeleteDevice("device42".to_string()))
        .await
        .unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.device_id, "device42", "Registry unchanged");
    assert_eq!(
        snapshot.last_error.as_deref(),
        Some("Cannot delete the last device")
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_current_device_switches_to_remaining() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), two_device_registry());
    settle().await;

    harness
        .handle
        .send(Command::DeleteDevice("d1".to_string()))
        .await
        .unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert_eq!(snapshot.device_id, "d2");
    assert!(client.fetches().contains(&"d2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_create_device_becomes_current() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness
        .handle
        .send(Command::CreateDevice("Car GPS".to_string()))
        .await
        .unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert_ne!(snapshot.device_id, "device42");
    assert!(snapshot.device_id.starts_with("device-"));
    assert_eq!(snapshot.probability, 0.0);
}

// ============================================================================
// Starting Point Commands
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_manual_entry_validation_through_engine() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness
        .handle
        .send(Command::SetStartFromManualEntry {
            lat: "91".to_string(),
            lon: "0".to_string(),
        })
        .await
        .unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert!(snapshot.starting_point.is_none());
    assert!(snapshot
        .last_error
        .as_deref()
        .unwrap()
        .contains("Invalid coordinates"));

    harness
        .handle
        .send(Command::SetStartFromManualEntry {
            lat: "-90".to_string(),
            lon: "180".to_string(),
        })
        .await
        .unwrap();
    settle().await;

    let snapshot = harness.state.snapshot();
    assert_eq!(
        snapshot.starting_point.map(|a| a.coords()),
        Some((-90.0, 180.0))
    );
}

#[tokio::test(start_paused = true)]
async fn test_anchor_from_live_position_requires_fix() {
    let client = MockTrajectoryClient::new();
    let harness = Harness::spawn(Arc::clone(&client), DeviceRegistry::default());
    settle().await;

    harness
        .handle
        .send(Command::SetStartFromLivePosition)
        .await
        .unwrap();
    settle().await;
    assert!(harness
        .state
        .snapshot()
        .last_error
        .as_deref()
        .unwrap()
        .contains("No GPS position available"));

    harness.handle.start_tracking().await.unwrap();
    harness.push_fix(53.5, 10.0).await;
    harness
        .handle
        .send(Command::SetStartFromLivePosition)
        .await
        .unwrap();
    settle().await;

    assert_eq!(
        harness.state.snapshot().starting_point.map(|a| a.coords()),
        Some((53.5, 10.0))
    );
}
