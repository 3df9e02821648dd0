//! Command handlers for the GeoTrack CLI.

pub mod devices;
pub mod run;
