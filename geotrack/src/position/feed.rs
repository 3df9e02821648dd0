//! Location feed trait and UDP implementation.
//!
//! The [`LocationFeed`] trait abstracts over the underlying source of GPS
//! fixes, allowing [`PositionSource`](super::PositionSource) to work with any
//! push-based provider. The [`UdpLocationFeed`] implementation listens for
//! JSON position datagrams, the way companion tracker apps broadcast fixes
//! on the local network.
//!
//! # Datagram format
//!
//! ```json
//! {"lat": 53.5502, "lon": 9.9937, "accuracy": 8.0, "timestamp": 1700000000000}
//! ```
//!
//! `accuracy` and `timestamp` are optional; a missing timestamp is stamped
//! with the receive time. Malformed or out-of-range datagrams are skipped,
//! not treated as faults.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use serde::Deserialize;
use tokio::net::UdpSocket;
use tracing::debug;

use super::state::{GeolocationFault, Position};

/// Maximum datagram size we expect.
const MAX_DATAGRAM_SIZE: usize = 1024;

/// Default bound on how long to wait for a single fix.
pub const DEFAULT_FIX_TIMEOUT: Duration = Duration::from_secs(10);

/// Subscription options for a location feed.
///
/// Mirrors the knobs a push-based platform location API exposes: request the
/// most precise fixes available, never serve a cached fix, and bound the wait
/// for each one.
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Request high-accuracy fixes from feeds that support the distinction.
    pub high_accuracy: bool,

    /// Maximum acceptable age of a fix. Zero means every emission must be a
    /// fresh reading.
    pub max_fix_age: Duration,

    /// How long to wait for a fix before the subscription faults with
    /// [`GeolocationFault::Timeout`].
    pub fix_timeout: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_fix_age: Duration::ZERO,
            fix_timeout: DEFAULT_FIX_TIMEOUT,
        }
    }
}

/// Trait for push-based sources of position fixes.
///
/// Implementations wait for the next fix; resource acquisition (sockets,
/// platform subscriptions) happens lazily so that a feed value can be built
/// synchronously and opened on the watch task. Dropping the feed releases
/// everything it holds.
pub trait LocationFeed: Send + 'static {
    /// Wait for the next fix.
    ///
    /// A returned fault is terminal for this subscription.
    fn next_fix(&mut self) -> impl Future<Output = Result<Position, GeolocationFault>> + Send;
}

/// Wire shape of a position datagram.
#[derive(Debug, Deserialize)]
struct FixDatagram {
    lat: f64,
    lon: f64,
    #[serde(default)]
    accuracy: Option<f64>,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// UDP JSON datagram feed.
///
/// Binds lazily on the first `next_fix()` call so the socket lives on the
/// watch task that consumes it and is released when the subscription ends.
pub struct UdpLocationFeed {
    port: u16,
    socket: Option<UdpSocket>,
}

impl UdpLocationFeed {
    /// Create a feed listening on the given UDP port.
    pub fn new(port: u16) -> Self {
        Self { port, socket: None }
    }

    /// The configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    async fn socket(&mut self) -> Result<&UdpSocket, GeolocationFault> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind(("0.0.0.0", self.port)).await.map_err(|e| {
                if e.kind() == ErrorKind::PermissionDenied {
                    GeolocationFault::permission_denied()
                } else {
                    GeolocationFault::Unavailable(format!(
                        "Failed to bind UDP port {}: {}",
                        self.port, e
                    ))
                }
            })?;
            tracing::info!(port = self.port, "Position feed listening");
            self.socket = Some(socket);
        }
        // Checked or populated just above.
        Ok(self.socket.as_ref().unwrap())
    }
}

impl LocationFeed for UdpLocationFeed {
    async fn next_fix(&mut self) -> Result<Position, GeolocationFault> {
        let port = self.port;
        let socket = self.socket().await?;
        let mut buffer = [0u8; MAX_DATAGRAM_SIZE];

        loop {
            let len = socket
                .recv(&mut buffer)
                .await
                .map_err(|e| GeolocationFault::Unavailable(format!("UDP receive error: {}", e)))?;

            match parse_datagram(&buffer[..len]) {
                Some(position) => return Ok(position),
                None => {
                    debug!(port, len, "Skipping malformed position datagram");
                }
            }
        }
    }
}

/// Parse a JSON position datagram into a [`Position`].
///
/// Returns `None` for malformed payloads and out-of-range coordinates.
fn parse_datagram(data: &[u8]) -> Option<Position> {
    let datagram: FixDatagram = serde_json::from_slice(data).ok()?;

    let position = Position {
        lat: datagram.lat,
        lon: datagram.lon,
        accuracy: datagram.accuracy,
        timestamp: datagram
            .timestamp
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
    };

    position.in_range().then_some(position)
}
