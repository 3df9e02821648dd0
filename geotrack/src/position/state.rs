//! Core types for device position tracking.
//!
//! This module defines the fundamental types produced by the position feed:
//!
//! - [`Position`] - A single GPS fix with optional accuracy metadata
//! - [`GeolocationFault`] - Classified failures of the location feed
//! - [`PositionEvent`] - What a subscription actually yields

use serde::{Deserialize, Serialize};

/// A single position fix.
///
/// Immutable once emitted by the feed. Timestamps are epoch milliseconds,
/// matching the wire format of the prediction service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,

    /// Longitude in degrees (-180 to 180).
    pub lon: f64,

    /// Reported accuracy in meters, if the feed provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,

    /// When this fix was measured (epoch milliseconds).
    pub timestamp: i64,
}

impl Position {
    /// Create a fix stamped with the current wall-clock time.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self {
            lat,
            lon,
            accuracy: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// The fix as a bare coordinate pair.
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Check that both coordinates fall in their valid ranges.
    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Classified failures of the location feed.
///
/// Any fault terminates the active subscription: the source forwards the
/// fault once and transitions to stopped. Callers must not assume tracking
/// continues after receiving one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationFault {
    /// The platform refused access to location data.
    #[error("{0}")]
    PermissionDenied(String),

    /// The feed exists but could not produce a fix.
    #[error("{0}")]
    Unavailable(String),

    /// No fix arrived within the configured per-fix timeout.
    #[error("{0}")]
    Timeout(String),
}

impl GeolocationFault {
    /// Permission fault with the standard message.
    pub fn permission_denied() -> Self {
        Self::PermissionDenied(
            "Location permission denied. Please enable location access.".to_string(),
        )
    }

    /// Unavailable fault with the standard message.
    pub fn unavailable() -> Self {
        Self::Unavailable("Location information unavailable.".to_string())
    }

    /// Timeout fault with the standard message.
    pub fn timeout() -> Self {
        Self::Timeout("Location request timed out.".to_string())
    }
}

/// What a position subscription yields: a fix, or a terminal fault.
pub type PositionEvent = Result<Position, GeolocationFault>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_new_stamps_timestamp() {
        let pos = Position::new(53.5, 10.0);
        assert_eq!(pos.coords(), (53.5, 10.0));
        assert!(pos.accuracy.is_none());
        assert!(pos.timestamp > 0);
    }

    #[test]
    fn test_position_in_range() {
        assert!(Position::new(0.0, 0.0).in_range());
        assert!(Position::new(-90.0, 180.0).in_range());
        assert!(Position::new(90.0, -180.0).in_range());
        assert!(!Position::new(91.0, 0.0).in_range());
        assert!(!Position::new(45.0, -200.0).in_range());
    }

    #[test]
    fn test_position_deserialize_without_accuracy() {
        let json = r#"{"lat": 53.5, "lon": 10.0, "timestamp": 1700000000000}"#;
        let pos: Position = serde_json::from_str(json).unwrap();
        assert_eq!(pos.lat, 53.5);
        assert!(pos.accuracy.is_none());
    }

    #[test]
    fn test_fault_messages() {
        assert_eq!(
            GeolocationFault::permission_denied().to_string(),
            "Location permission denied. Please enable location access."
        );
        assert_eq!(
            GeolocationFault::unavailable().to_string(),
            "Location information unavailable."
        );
        assert_eq!(
            GeolocationFault::timeout().to_string(),
            "Location request timed out."
        );
    }
}
