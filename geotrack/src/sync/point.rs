//! Trajectory point wire type.

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// One point of a device trajectory.
///
/// This is our own type matching the prediction service's wire shape; the
/// timestamp is optional because simulated points may omit it.
///
/// # Ordering
///
/// A trajectory is ordered most-recent-first: index 0 is the latest known
/// point and the last index is the origin. The service returns trajectories
/// in this order and the client preserves it verbatim — local code never
/// reorders or appends, it only replaces the whole sequence with a fetched
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Latitude in degrees.
    pub lat: f64,

    /// Longitude in degrees.
    pub lon: f64,

    /// When the point was observed (epoch milliseconds), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl TrajectoryPoint {
    /// Build a point stamped with the current wall-clock time.
    pub fn now(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            timestamp: Some(chrono::Utc::now().timestamp_millis()),
        }
    }

    /// The point as a bare coordinate pair.
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

impl From<&Position> for TrajectoryPoint {
    fn from(position: &Position) -> Self {
        Self {
            lat: position.lat,
            lon: position.lon,
            timestamp: Some(position.timestamp),
        }
    }
}
