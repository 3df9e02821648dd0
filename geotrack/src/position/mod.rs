//! Device position tracking.
//!
//! This module provides the position half of the synchronization engine:
//! a push-based subscription over a location feed, plus the significance
//! filter that decides which fixes are worth transmitting.
//!
//! # Components
//!
//! - [`state`] - Core types: [`Position`], [`GeolocationFault`], [`PositionEvent`]
//! - [`feed`] - [`LocationFeed`] trait and the UDP datagram implementation
//! - [`source`] - [`PositionSource`] subscription lifecycle (start/stop, faults)
//! - [`filter`] - [`significant_movement`] jitter gate
//!
//! # Usage
//!
//! ```ignore
//! use tokio::sync::mpsc;
//! use geotrack::position::{FeedOptions, PositionSource, UdpLocationFeed};
//!
//! let (event_tx, mut event_rx) = mpsc::channel(32);
//! let mut source = PositionSource::new(
//!     || UdpLocationFeed::new(47999),
//!     FeedOptions::default(),
//!     event_tx,
//! );
//! source.start();
//!
//! while let Some(event) = event_rx.recv().await {
//!     match event {
//!         Ok(position) => println!("Fix: {}, {}", position.lat, position.lon),
//!         Err(fault) => {
//!             // The subscription has already stopped itself.
//!             eprintln!("{}", fault);
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod feed;
pub mod filter;
pub mod source;
pub mod state;

pub use feed::{FeedOptions, LocationFeed, UdpLocationFeed, DEFAULT_FIX_TIMEOUT};
pub use filter::{significant_movement, MOVEMENT_THRESHOLD_DEG};
pub use source::PositionSource;
pub use state::{GeolocationFault, Position, PositionEvent};
