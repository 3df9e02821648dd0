//! Auto-send scheduler.
//!
//! While tracking is active and a cadence is selected, the scheduler
//! periodically forces a transmission of the current position, bypassing the
//! movement filter — an auto-send must never be silently swallowed by the
//! jitter threshold. Ticks are delivered to the orchestrator over a channel;
//! the decision of what (and whether) to send on a tick stays with the
//! orchestrator, which knows the current fix.
//!
//! # Single-timer invariant
//!
//! At most one timer is ever live per scheduler instance. `arm()` always
//! cancels the previous timer before starting a new one, and `disarm()` (or
//! dropping the scheduler) cancels synchronously. A timer whose cancellation
//! token fires stops without delivering further ticks.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Auto-send cadence options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cadence {
    /// Manual sends only.
    #[default]
    Off,
    Secs5,
    Secs10,
    Secs30,
    Secs60,
}

impl Cadence {
    /// All selectable cadences.
    pub const ALL: [Cadence; 5] = [
        Cadence::Off,
        Cadence::Secs5,
        Cadence::Secs10,
        Cadence::Secs30,
        Cadence::Secs60,
    ];

    /// Tick period, or `None` for manual-only.
    pub fn period(&self) -> Option<Duration> {
        match self {
            Cadence::Off => None,
            Cadence::Secs5 => Some(Duration::from_secs(5)),
            Cadence::Secs10 => Some(Duration::from_secs(10)),
            Cadence::Secs30 => Some(Duration::from_secs(30)),
            Cadence::Secs60 => Some(Duration::from_secs(60)),
        }
    }

    /// Parse a cadence from whole seconds; `0` means off.
    pub fn from_secs(secs: u64) -> Option<Cadence> {
        match secs {
            0 => Some(Cadence::Off),
            5 => Some(Cadence::Secs5),
            10 => Some(Cadence::Secs10),
            30 => Some(Cadence::Secs30),
            60 => Some(Cadence::Secs60),
            _ => None,
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Secs5 => write!(f, "5s"),
            Self::Secs10 => write!(f, "10s"),
            Self::Secs30 => write!(f, "30s"),
            Self::Secs60 => write!(f, "60s"),
        }
    }
}

/// Scheduler that owns the auto-send timer.
pub struct AutoSendScheduler {
    tick_tx: mpsc::Sender<()>,
    armed: Option<(Cadence, CancellationToken)>,
}

impl AutoSendScheduler {
    /// Create a scheduler delivering ticks to `tick_tx`.
    pub fn new(tick_tx: mpsc::Sender<()>) -> Self {
        Self {
            tick_tx,
            armed: None,
        }
    }

    /// The armed cadence, or `Off`.
    pub fn cadence(&self) -> Cadence {
        self.armed
            .as_ref()
            .map(|(c, _)| *c)
            .unwrap_or(Cadence::Off)
    }

    /// Whether a timer is live.
    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Arm the timer at the given cadence.
    ///
    /// Any previous timer is cancelled first; arming with `Off` is
    /// equivalent to `disarm()`.
    pub fn arm(&mut self, cadence: Cadence) {
        self.disarm();

        let Some(period) = cadence.period() else {
            return;
        };

        let token = CancellationToken::new();
        spawn_timer(period, token.clone(), self.tick_tx.clone());
        self.armed = Some((cadence, token));
        info!(period_secs = period.as_secs(), "Auto-send timer armed");
    }

    /// Cancel the live timer, if any.
    pub fn disarm(&mut self) {
        if let Some((cadence, token)) = self.armed.take() {
            token.cancel();
            debug!(?cadence, "Auto-send timer disarmed");
        }
    }
}

impl Drop for AutoSendScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Spawn the tick task: one tick per period until cancelled or the receiver
/// goes away.
fn spawn_timer(period: Duration, token: CancellationToken, tick_tx: mpsc::Sender<()>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first interval tick completes immediately; consume it so the
        // first delivered tick lands one full period after arming.
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => break,

                _ = interval.tick() => {
                    if tick_tx.send(()).await.is_err() {
                        debug!("Tick channel closed, stopping auto-send timer");
                        break;
                    }
                }
            }
        }
    });
}
