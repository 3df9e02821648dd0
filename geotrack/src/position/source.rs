//! Position source - subscription lifecycle over a location feed.
//!
//! [`PositionSource`] owns the start/stop state machine around a
//! [`LocationFeed`]: at most one active subscription, per-fix timeout
//! enforcement, and fault handling. Fixes and faults are forwarded to the
//! consumer as [`PositionEvent`]s over an mpsc channel.
//!
//! # Design
//!
//! - `start()` is a no-op while a subscription is already running
//! - `stop()` cancels the watch task; the feed is dropped with it, releasing
//!   whatever it holds
//! - any fault (including a per-fix timeout) is forwarded once and ends the
//!   subscription; the source transitions back to stopped on its own

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::feed::{FeedOptions, LocationFeed};
use super::state::{GeolocationFault, PositionEvent};

/// Subscription manager for a push-based location feed.
///
/// A fresh feed instance is built from the factory for every subscription,
/// so stopping and restarting re-acquires the underlying resources.
pub struct PositionSource<F: LocationFeed> {
    factory: Box<dyn Fn() -> F + Send + Sync>,
    options: FeedOptions,
    event_tx: mpsc::Sender<PositionEvent>,
    running: Arc<AtomicBool>,
    cancel: Option<CancellationToken>,
}

impl<F: LocationFeed> PositionSource<F> {
    /// Create a new source.
    ///
    /// `factory` builds the feed for each subscription; `event_tx` is where
    /// fixes and faults are delivered.
    pub fn new(
        factory: impl Fn() -> F + Send + Sync + 'static,
        options: FeedOptions,
        event_tx: mpsc::Sender<PositionEvent>,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            options,
            event_tx,
            running: Arc::new(AtomicBool::new(false)),
            cancel: None,
        }
    }

    /// Whether a subscription is currently active.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Begin a subscription. No-op if one is already running.
    pub fn start(&mut self) {
        if self.running.load(Ordering::Acquire) {
            debug!("Position source already running, ignoring start");
            return;
        }

        // Each subscription gets its own flag so a lingering previous watch
        // task cannot clear the state of its successor on exit.
        let running = Arc::new(AtomicBool::new(true));
        self.running = Arc::clone(&running);

        let feed = (self.factory)();
        let token = CancellationToken::new();
        self.cancel = Some(token.clone());

        let event_tx = self.event_tx.clone();
        let fix_timeout = self.options.fix_timeout;

        tokio::spawn(async move {
            let mut feed = feed;
            let mut fixes: u64 = 0;

            loop {
                tokio::select! {
                    biased;

                    _ = token.cancelled() => {
                        debug!(fixes, "Position subscription cancelled");
                        break;
                    }

                    fix = tokio::time::timeout(fix_timeout, feed.next_fix()) => {
                        match fix {
                            Ok(Ok(position)) => {
                                fixes += 1;
                                if event_tx.send(Ok(position)).await.is_err() {
                                    debug!("Position event channel closed, stopping");
                                    break;
                                }
                            }
                            Ok(Err(fault)) => {
                                info!(fault = %fault, "Position feed faulted, stopping subscription");
                                let _ = event_tx.send(Err(fault)).await;
                                break;
                            }
                            Err(_elapsed) => {
                                info!(
                                    timeout_secs = fix_timeout.as_secs(),
                                    "No fix within timeout, stopping subscription"
                                );
                                let _ = event_tx.send(Err(GeolocationFault::timeout())).await;
                                break;
                            }
                        }
                    }
                }
            }

            running.store(false, Ordering::Release);
            // `feed` dropped here, releasing the underlying subscription.
        });

        info!("Position subscription started");
    }

    /// End the active subscription, if any.
    pub fn stop(&mut self) {
        if let Some(token) = self.cancel.take() {
            token.cancel();
        }
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Position subscription stopped");
        }
    }
}

impl<F: LocationFeed> Drop for PositionSource<F> {
    fn drop(&mut self) {
        self.stop();
    }
}
