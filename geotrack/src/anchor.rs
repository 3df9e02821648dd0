//! Starting point management.
//!
//! A starting point is an optional anchor coordinate, independent of
//! trajectory history. The simulation path consults it when a device has no
//! trajectory yet; without either, there is nothing to grow a trajectory
//! from. The anchor can be sourced three ways: the live GPS fix, a trusted
//! pick (e.g. a map interaction), or manual text entry.

use serde::{Deserialize, Serialize};

use crate::position::Position;

/// An anchor coordinate used to seed trajectory growth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartingPoint {
    pub lat: f64,
    pub lon: f64,
}

impl StartingPoint {
    /// Build a starting point, validating coordinate ranges.
    pub fn new(lat: f64, lon: f64) -> Result<Self, AnchorError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(AnchorError::invalid_coordinates());
        }
        Ok(Self { lat, lon })
    }

    /// The anchor as a coordinate pair.
    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Errors from starting point mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// Tried to anchor to the live position while no fix exists.
    #[error("{0}")]
    NoPositionAvailable(String),

    /// Manual entry did not parse or fell outside valid ranges.
    #[error("{0}")]
    InvalidCoordinates(String),
}

impl AnchorError {
    fn no_position() -> Self {
        Self::NoPositionAvailable(
            "No GPS position available. Please start GPS tracking first.".to_string(),
        )
    }

    fn invalid_coordinates() -> Self {
        Self::InvalidCoordinates(
            "Invalid coordinates. Latitude must be -90 to 90, Longitude must be -180 to 180."
                .to_string(),
        )
    }
}

/// Holds zero or one starting point.
#[derive(Debug, Default)]
pub struct StartingPointManager {
    anchor: Option<StartingPoint>,
}

impl StartingPointManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current anchor, if set.
    pub fn get(&self) -> Option<StartingPoint> {
        self.anchor
    }

    /// Anchor to the current live fix.
    ///
    /// Fails when the position source has no fix to offer.
    pub fn set_from_live_position(
        &mut self,
        current: Option<&Position>,
    ) -> Result<StartingPoint, AnchorError> {
        let position = current.ok_or_else(AnchorError::no_position)?;
        let anchor = StartingPoint {
            lat: position.lat,
            lon: position.lon,
        };
        self.anchor = Some(anchor);
        tracing::info!(lat = anchor.lat, lon = anchor.lon, "Starting point set from live position");
        Ok(anchor)
    }

    /// Anchor to a trusted coordinate, e.g. a map pick. Always succeeds.
    pub fn set_from_pick(&mut self, lat: f64, lon: f64) -> StartingPoint {
        let anchor = StartingPoint { lat, lon };
        self.anchor = Some(anchor);
        tracing::info!(lat, lon, "Starting point set from pick");
        anchor
    }

    /// Anchor from manually entered text.
    ///
    /// Both fields must parse as numbers and fall in range.
    pub fn set_from_manual_entry(
        &mut self,
        lat: &str,
        lon: &str,
    ) -> Result<StartingPoint, AnchorError> {
        let lat: f64 = lat
            .trim()
            .parse()
            .map_err(|_| AnchorError::invalid_coordinates())?;
        let lon: f64 = lon
            .trim()
            .parse()
            .map_err(|_| AnchorError::invalid_coordinates())?;

        let anchor = StartingPoint::new(lat, lon)?;
        self.anchor = Some(anchor);
        tracing::info!(lat, lon, "Starting point set from manual entry");
        Ok(anchor)
    }

    /// Remove the anchor.
    pub fn clear(&mut self) {
        if self.anchor.take().is_some() {
            tracing::info!("Starting point cleared");
        }
    }
}
