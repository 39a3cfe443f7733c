//! Cancellable periodic task
//!
//! A [`PollTask`] runs a tick closure on a fixed period until the closure
//! breaks, the optional timeout elapses, or the task is cancelled. Exactly
//! one of these ends the task, and nothing runs after it has ended.
//!
//! Cancellation wins over the timeout, and the timeout wins over a tick
//! falling due at the same instant.

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// When a task ticks and how long it may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub period: Duration,
    pub timeout: Option<Duration>,
}

impl PollSchedule {
    /// Tick every `period`, forever
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            timeout: None,
        }
    }

    /// Give up once `timeout` has elapsed since the task started
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// How a task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The tick closure broke with a value
    Completed(T),
    TimedOut,
    Cancelled,
}

/// Handle to a running periodic task
///
/// Dropping the handle cancels the task.
pub struct PollTask<T> {
    token: CancellationToken,
    handle: Option<JoinHandle<PollOutcome<T>>>,
    started_at: Instant,
}

impl<T: Send + 'static> PollTask<T> {
    /// Spawn a task calling `tick` once per period
    ///
    /// The first tick happens one full period after start.
    pub fn start<F, Fut>(schedule: PollSchedule, tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<T>> + Send + 'static,
    {
        let token = CancellationToken::new();
        let started_at = Instant::now();
        let handle = tokio::spawn(run(schedule, started_at, token.clone(), tick));

        Self {
            token,
            handle: Some(handle),
            started_at,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token cancelling this task, usable after the handle has been moved
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the task to end
    pub async fn completion(mut self) -> PollOutcome<T> {
        let Some(handle) = self.handle.take() else {
            return PollOutcome::Cancelled;
        };

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                if e.is_panic() {
                    error!("Poll task panicked: {}", e);
                }
                PollOutcome::Cancelled
            }
        }
    }
}

impl<T> Drop for PollTask<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run<T, F, Fut>(
    schedule: PollSchedule,
    started_at: Instant,
    token: CancellationToken,
    mut tick: F,
) -> PollOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ControlFlow<T>>,
{
    let deadline = schedule.timeout.map(|timeout| started_at + timeout);
    let mut ticker = interval_at(started_at + schedule.period, schedule.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            _ = until(deadline) => {
                debug!("Poll task timed out after {:?}", schedule.timeout);
                return PollOutcome::TimedOut;
            }
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => return PollOutcome::Cancelled,
            _ = until(deadline) => return PollOutcome::TimedOut,
            flow = tick() => {
                if let ControlFlow::Break(value) = flow {
                    return PollOutcome::Completed(value);
                }
            }
        }
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting(
        ticks: &Arc<AtomicU32>,
        stop_at: Option<u32>,
    ) -> impl FnMut() -> std::future::Ready<ControlFlow<u32>> + Send + 'static {
        let ticks = Arc::clone(ticks);
        move || {
            let n = ticks.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(match stop_at {
                Some(stop) if n >= stop => ControlFlow::Break(n),
                _ => ControlFlow::Continue(()),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_period() {
        let ticks = Arc::new(AtomicU32::new(0));
        let _task = PollTask::start(PollSchedule::every(Duration::from_secs(60)), counting(&ticks, None));

        tokio::time::sleep(Duration::from_millis(59_999)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_break_completes() {
        let ticks = Arc::new(AtomicU32::new(0));
        let task = PollTask::start(PollSchedule::every(Duration::from_secs(2)), counting(&ticks, Some(3)));

        let start = Instant::now();
        assert_eq!(task.completion().await, PollOutcome::Completed(3));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(6) && elapsed < Duration::from_millis(6_010));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_wins_over_tick_at_deadline() {
        let ticks = Arc::new(AtomicU32::new(0));
        let schedule = PollSchedule::every(Duration::from_secs(2)).with_timeout(Duration::from_secs(10));
        let task = PollTask::start(schedule, counting(&ticks, None));

        assert_eq!(task.completion().await, PollOutcome::<u32>::TimedOut);
        // Ticks at 2, 4, 6, 8; the one due at 10 loses to the deadline
        assert_eq!(ticks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let ticks = Arc::new(AtomicU32::new(0));
        let task = PollTask::start(PollSchedule::every(Duration::from_secs(1)), counting(&ticks, None));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        task.cancel();
        assert!(task.is_cancelled());

        assert_eq!(task.completion().await, PollOutcome::<u32>::Cancelled);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let ticks = Arc::new(AtomicU32::new(0));
        let task = PollTask::start(PollSchedule::every(Duration::from_secs(1)), counting(&ticks, None));
        let token = task.cancellation_token();

        drop(task);
        assert!(token.is_cancelled());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
