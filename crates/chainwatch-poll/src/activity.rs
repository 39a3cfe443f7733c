//! User activity tracking
//!
//! Refreshing stops once nobody has interacted with the client for a while.
//! The tracker records the instant of the latest interaction; consumers
//! either ask [`ActivityTracker::is_stale`] before doing work or hold an
//! [`ActivitySubscription`] to be woken on the next interaction.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Latest user interaction, shared by every view of one session
#[derive(Debug, Clone)]
pub struct ActivityTracker {
    last_activity: Arc<watch::Sender<Instant>>,
    stale_after: Duration,
}

impl ActivityTracker {
    /// One hour without interaction suspends refreshing
    pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

    pub fn new(stale_after: Duration) -> Self {
        let (tx, _rx) = watch::channel(Instant::now());
        Self {
            last_activity: Arc::new(tx),
            stale_after,
        }
    }

    /// Record an interaction now
    pub fn record(&self) {
        self.last_activity.send_replace(Instant::now());
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.borrow()
    }

    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_activity())
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// True once the idle time has reached the staleness threshold
    pub fn is_stale(&self) -> bool {
        self.idle_for() >= self.stale_after
    }

    /// Start listening for interactions
    ///
    /// The subscription ends when it is dropped or passed to
    /// [`ActivitySubscription::unsubscribe`].
    pub fn subscribe(&self) -> ActivitySubscription {
        ActivitySubscription {
            rx: self.last_activity.subscribe(),
        }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.last_activity.receiver_count()
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_STALE_AFTER)
    }
}

/// Wakes its holder on every recorded interaction
#[derive(Debug)]
pub struct ActivitySubscription {
    rx: watch::Receiver<Instant>,
}

impl ActivitySubscription {
    /// Wait for the next interaction
    ///
    /// Returns `None` once every tracker handle is gone.
    pub async fn changed(&mut self) -> Option<Instant> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }

    pub fn unsubscribe(self) {}
}
