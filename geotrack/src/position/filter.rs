//! Movement significance filter.
//!
//! GPS receivers jitter by a few meters even when the device is stationary.
//! Sending every fix to the prediction service would flood it with noise, so
//! transmission is gated on a fixed per-axis threshold: a candidate fix is
//! significant only if it moved more than [`MOVEMENT_THRESHOLD_DEG`] in
//! latitude or longitude since the last transmitted position.
//!
//! The threshold is a linear approximation (~5 m at the equator). It under-
//! and over-estimates true ground distance at high latitudes and near the
//! antimeridian; that imprecision is accepted, the filter only exists to
//! bound network volume.

/// Per-axis significance threshold in degrees (~5 meters at the equator).
pub const MOVEMENT_THRESHOLD_DEG: f64 = 0.000045;

/// Decide whether a candidate fix is worth transmitting.
///
/// The first observation (no previously transmitted position) is always
/// significant. Otherwise either coordinate must have moved strictly more
/// than the threshold.
pub fn significant_movement(last: Option<(f64, f64)>, candidate: (f64, f64)) -> bool {
    match last {
        None => true,
        Some((last_lat, last_lon)) => {
            (candidate.0 - last_lat).abs() > MOVEMENT_THRESHOLD_DEG
                || (candidate.1 - last_lon).abs() > MOVEMENT_THRESHOLD_DEG
        }
    }
}
