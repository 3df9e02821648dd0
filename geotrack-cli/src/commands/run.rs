//! Run command - track a device and synchronize with the service.
//!
//! Wires a UDP position feed and the HTTP trajectory client into the
//! orchestrator. In the default mode it starts live tracking and prints a
//! status line whenever the synchronized state changes, until Ctrl-C. With
//! `--simulate N` it instead submits N synthesized points grown from the
//! starting point (or the device's existing trajectory) and exits.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use geotrack::device::{DeviceStore, JsonDeviceStore};
use geotrack::position::{FeedOptions, UdpLocationFeed};
use geotrack::sync::{
    Cadence, Command, HttpTrajectoryClient, SyncHandle, SyncOrchestrator, DEFAULT_BASE_URL,
};

use crate::error::CliError;
use crate::CadenceArg;

/// Default UDP port for position datagrams.
const DEFAULT_FEED_PORT: u16 = 47999;

/// How often the status line is refreshed.
const STATUS_INTERVAL: Duration = Duration::from_secs(2);

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Base URL of the prediction service
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub server: String,

    /// UDP port to receive position datagrams on
    #[arg(long, default_value_t = DEFAULT_FEED_PORT)]
    pub port: u16,

    /// Auto-send cadence
    #[arg(long, value_enum, default_value = "off")]
    pub cadence: CadenceArg,

    /// Device id to track (defaults to the registry's current device)
    #[arg(long)]
    pub device: Option<String>,

    /// Starting point latitude (used with --start-lon)
    #[arg(long, requires = "start_lon")]
    pub start_lat: Option<String>,

    /// Starting point longitude (used with --start-lat)
    #[arg(long, requires = "start_lat")]
    pub start_lon: Option<String>,

    /// Submit N simulated points instead of live tracking
    #[arg(long, default_value_t = 0)]
    pub simulate: u32,
}

/// Run the tracking (or simulation) session.
pub async fn run(args: RunArgs) -> Result<(), CliError> {
    let client =
        Arc::new(HttpTrajectoryClient::new(&args.server).map_err(CliError::ClientSetup)?);

    let store = JsonDeviceStore::new();
    let mut registry = store.load();
    if let Some(device) = &args.device {
        registry
            .switch(device)
            .map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    }

    info!(
        server = %args.server,
        port = args.port,
        device = %registry.current_id(),
        "Starting session"
    );

    let port = args.port;
    let orchestrator = SyncOrchestrator::new(
        client,
        move || UdpLocationFeed::new(port),
        FeedOptions::default(),
        registry,
        Box::new(store),
    );
    let handle = orchestrator.handle();
    let state = orchestrator.shared_state();

    let cancellation = CancellationToken::new();
    let engine = tokio::spawn(orchestrator.run(cancellation.clone()));

    if let (Some(lat), Some(lon)) = (args.start_lat.clone(), args.start_lon.clone()) {
        handle
            .send(Command::SetStartFromManualEntry { lat, lon })
            .await
            .map_err(CliError::Engine)?;
    }

    if args.simulate > 0 {
        simulate(&handle, &state, args.simulate).await?;
    } else {
        track(&handle, &state, Cadence::from(args.cadence)).await?;
    }

    let _ = handle.shutdown().await;
    cancellation.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), engine).await;
    Ok(())
}

/// Live tracking mode: run until Ctrl-C.
async fn track(
    handle: &SyncHandle,
    state: &geotrack::sync::SharedSyncState,
    cadence: Cadence,
) -> Result<(), CliError> {
    handle.start_tracking().await.map_err(CliError::Engine)?;
    handle.set_cadence(cadence).await.map_err(CliError::Engine)?;

    let mut status = tokio::time::interval(STATUS_INTERVAL);
    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                info!("Interrupted, shutting down");
                return Ok(());
            }
            _ = status.tick() => {
                let line = status_line(&state.snapshot());
                if line != last_line {
                    println!("{}", line);
                    last_line = line;
                }
            }
        }
    }
}

/// Simulation mode: submit `count` synthesized points, then report.
async fn simulate(
    handle: &SyncHandle,
    state: &geotrack::sync::SharedSyncState,
    count: u32,
) -> Result<(), CliError> {
    for _ in 0..count {
        handle.add_simulated_point().await.map_err(CliError::Engine)?;

        // Wait for the round-trip to settle before growing further.
        tokio::time::sleep(Duration::from_millis(300)).await;
        while state.is_loading() {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let snapshot = state.snapshot();
        if let Some(error) = &snapshot.last_error {
            return Err(CliError::InvalidArgument(error.clone()));
        }
    }

    println!("{}", status_line(&state.snapshot()));
    Ok(())
}

fn status_line(snapshot: &geotrack::sync::SyncSnapshot) -> String {
    format!(
        "device={} tracking={} points={} probability={:.3} error={}",
        snapshot.device_id,
        snapshot.tracking,
        snapshot.trajectory.len(),
        snapshot.probability,
        snapshot.last_error.as_deref().unwrap_or("-"),
    )
}
