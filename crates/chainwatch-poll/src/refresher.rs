//! Polling refresher
//!
//! Keeps the data behind one view current. A fetch is issued immediately
//! when the refresher starts and whenever its key (resource id and page)
//! changes, then once per interval while the user is active. Ticks that fall
//! after the user has gone idle are skipped until the next interaction.
//!
//! Fetches are not deduplicated and may overlap. A response is applied only
//! if it was issued for the current key and is newer than the data shown, so
//! a slow response can never overwrite a faster, later one.

use crate::activity::{ActivitySubscription, ActivityTracker};
use crate::source::Refreshable;
use crate::task::{PollSchedule, PollTask};
use chainwatch_client::ClientError;
use chainwatch_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// User-selectable refresh cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshInterval {
    #[default]
    Short,
    Long,
}

impl RefreshInterval {
    pub fn duration(self, config: &RefresherConfig) -> Duration {
        match self {
            RefreshInterval::Short => config.short_interval,
            RefreshInterval::Long => config.long_interval,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            RefreshInterval::Short => RefreshInterval::Long,
            RefreshInterval::Long => RefreshInterval::Short,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RefreshInterval::Short => "short",
            RefreshInterval::Long => "long",
        }
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RefreshInterval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" | "1m" | "1min" => Ok(RefreshInterval::Short),
            "long" | "5m" | "5min" => Ok(RefreshInterval::Long),
            other => Err(format!(
                "Unknown refresh interval '{}', expected 'short' or 'long'",
                other
            )),
        }
    }
}

/// Cadences and idle threshold shared by every refresher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefresherConfig {
    pub short_interval: Duration,
    pub long_interval: Duration,
    pub stale_after: Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            short_interval: Duration::from_secs(60),
            long_interval: Duration::from_secs(5 * 60),
            stale_after: ActivityTracker::DEFAULT_STALE_AFTER,
        }
    }
}

impl RefresherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.short_interval.is_zero() || self.long_interval.is_zero() {
            return Err(Error::ConfigValidation(
                "refresh intervals must be greater than zero".to_string(),
            ));
        }
        if self.stale_after.is_zero() {
            return Err(Error::ConfigValidation(
                "stale_after must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a view shows, published on every change
pub struct RefreshState<K, T> {
    /// Key the view currently asks for
    pub key: K,
    pub interval: RefreshInterval,
    /// Latest successfully applied result
    pub data: Option<Arc<T>>,
    /// Key `data` was fetched for
    pub data_key: Option<K>,
    /// Message of the latest failed fetch, cleared by the next success
    pub last_error: Option<String>,
    pub last_refreshed: Option<Instant>,
    pub in_flight: usize,
    /// A tick was skipped because the user is idle
    pub stale: bool,
    pub fetches_started: u64,
    applied_seq: u64,
}

impl<K: PartialEq, T> RefreshState<K, T> {
    fn new(key: K, interval: RefreshInterval) -> Self {
        Self {
            key,
            interval,
            data: None,
            data_key: None,
            last_error: None,
            last_refreshed: None,
            in_flight: 0,
            stale: false,
            fetches_started: 0,
            applied_seq: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Data fetched for the current key, if any has arrived yet
    pub fn current(&self) -> Option<&T> {
        match &self.data_key {
            Some(key) if *key == self.key => self.data.as_deref(),
            _ => None,
        }
    }
}

impl<K: Clone, T> Clone for RefreshState<K, T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            interval: self.interval,
            data: self.data.clone(),
            data_key: self.data_key.clone(),
            last_error: self.last_error.clone(),
            last_refreshed: self.last_refreshed,
            in_flight: self.in_flight,
            stale: self.stale,
            fetches_started: self.fetches_started,
            applied_seq: self.applied_seq,
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for RefreshState<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshState")
            .field("key", &self.key)
            .field("interval", &self.interval)
            .field("has_data", &self.data.is_some())
            .field("data_key", &self.data_key)
            .field("last_error", &self.last_error)
            .field("in_flight", &self.in_flight)
            .field("stale", &self.stale)
            .finish()
    }
}

type StateOf<S> = RefreshState<<S as Refreshable>::Key, <S as Refreshable>::Output>;

struct Shared<S: Refreshable> {
    source: S,
    config: RefresherConfig,
    activity: ActivityTracker,
    state: watch::Sender<StateOf<S>>,
    next_seq: AtomicU64,
    lifetime: CancellationToken,
}

impl<S: Refreshable> Shared<S> {
    fn on_tick(self: &Arc<Self>, key: &S::Key) {
        if self.lifetime.is_cancelled() {
            return;
        }
        if self.state.borrow().key != *key {
            debug!(?key, "Skipping tick scheduled for a replaced key");
            return;
        }
        if self.activity.is_stale() {
            self.state
                .send_if_modified(|s| !std::mem::replace(&mut s.stale, true));
            debug!(
                idle_secs = self.activity.idle_for().as_secs(),
                "User idle, skipping refresh"
            );
            return;
        }

        self.state
            .send_if_modified(|s| std::mem::replace(&mut s.stale, false));
        self.spawn_fetch(key.clone());
    }

    fn spawn_fetch(self: &Arc<Self>, key: S::Key) {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|s| {
            s.in_flight += 1;
            s.fetches_started += 1;
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = shared.lifetime.cancelled() => {
                    debug!(?key, seq, "Refresher stopped, dropping in-flight fetch");
                }
                result = shared.source.load(&key) => shared.apply(seq, &key, result),
            }
        });
    }

    fn apply(
        &self,
        seq: u64,
        key: &S::Key,
        result: std::result::Result<Option<S::Output>, ClientError>,
    ) {
        self.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);

            if s.key != *key {
                debug!(?key, seq, "Discarding response for a replaced key");
                return;
            }
            if seq <= s.applied_seq {
                debug!(?key, seq, applied = s.applied_seq, "Discarding out-of-order response");
                return;
            }

            match result {
                Ok(Some(output)) => {
                    s.data = Some(Arc::new(output));
                    s.data_key = Some(key.clone());
                    s.applied_seq = seq;
                    s.last_error = None;
                    s.last_refreshed = Some(Instant::now());
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(?key, error = %e, "Refresh failed, keeping previous data");
                    s.last_error = Some(e.user_message());
                }
            }
        });
    }
}

/// Periodically refetches one view's data
///
/// Dropping the refresher stops every timer and discards responses that
/// are still in flight.
pub struct PollingRefresher<S: Refreshable> {
    shared: Arc<Shared<S>>,
    schedule: Option<PollTask<()>>,
}

impl<S: Refreshable> PollingRefresher<S> {
    /// Fetch `key` now and keep refreshing it every `interval`
    pub fn start(
        source: S,
        key: S::Key,
        interval: RefreshInterval,
        activity: ActivityTracker,
        config: RefresherConfig,
    ) -> Self {
        let (state, _rx) = watch::channel(RefreshState::new(key.clone(), interval));
        let subscription = activity.subscribe();
        let shared = Arc::new(Shared {
            source,
            config,
            activity,
            state,
            next_seq: AtomicU64::new(0),
            lifetime: CancellationToken::new(),
        });

        tokio::spawn(clear_stale_on_activity(Arc::clone(&shared), subscription));

        info!(?key, %interval, "Starting refresher");
        shared.spawn_fetch(key);

        let mut refresher = Self {
            shared,
            schedule: None,
        };
        refresher.reschedule();
        refresher
    }

    pub fn key(&self) -> S::Key {
        self.shared.state.borrow().key.clone()
    }

    pub fn interval(&self) -> RefreshInterval {
        self.shared.state.borrow().interval
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.shared.activity
    }

    /// True while ticks are being skipped for lack of user activity
    pub fn is_suspended(&self) -> bool {
        self.shared.activity.is_stale()
    }

    /// Switch to a new key: fetch it now and restart the timer
    pub fn set_key(&mut self, key: S::Key) {
        if self.shared.state.borrow().key == key {
            return;
        }
        self.cancel_schedule();

        self.shared.state.send_modify(|s| {
            s.key = key.clone();
            s.last_error = None;
        });
        debug!(?key, "Key changed, refreshing");

        self.shared.spawn_fetch(key);
        self.reschedule();
    }

    /// Change the cadence; the next fetch happens one new interval from now
    pub fn set_interval(&mut self, interval: RefreshInterval) {
        if self.interval() == interval {
            return;
        }
        self.cancel_schedule();
        self.shared.state.send_modify(|s| s.interval = interval);
        debug!(%interval, "Refresh interval changed");
        self.reschedule();
    }

    /// Fetch the current key now without touching the timer
    pub fn refresh_now(&self) {
        let key = self.key();
        self.shared.spawn_fetch(key);
    }

    pub fn snapshot(&self) -> StateOf<S> {
        self.shared.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<StateOf<S>> {
        self.shared.state.subscribe()
    }

    pub fn stop(mut self) {
        self.shutdown();
        info!("Refresher stopped");
    }

    fn reschedule(&mut self) {
        self.cancel_schedule();
        let (key, interval) = {
            let state = self.shared.state.borrow();
            (state.key.clone(), state.interval)
        };
        let period = interval.duration(&self.shared.config);

        let shared = Arc::clone(&self.shared);
        self.schedule = Some(PollTask::start(PollSchedule::every(period), move || {
            shared.on_tick(&key);
            std::future::ready(ControlFlow::<()>::Continue(()))
        }));
    }

    fn cancel_schedule(&mut self) {
        if let Some(task) = self.schedule.take() {
            task.cancel();
        }
    }

    fn shutdown(&mut self) {
        self.shared.lifetime.cancel();
        self.cancel_schedule();
    }
}

impl<S: Refreshable> Drop for PollingRefresher<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn clear_stale_on_activity<S: Refreshable>(
    shared: Arc<Shared<S>>,
    mut subscription: ActivitySubscription,
) {
    loop {
        tokio::select! {
            _ = shared.lifetime.cancelled() => break,
            changed = subscription.changed() => {
                if changed.is_none() {
                    break;
                }
                shared.state.send_if_modified(|s| std::mem::replace(&mut s.stale, false));
            }
        }
    }
    subscription.unsubscribe();
}
