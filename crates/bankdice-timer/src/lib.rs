//! One-shot, cancellable delay timer for bankdice room actors.
//!
//! A room schedules at most one deferred transition at a time (the
//! rollover after every player has banked). [`DelayTimer`] holds that
//! deadline together with a payload describing what was scheduled, and
//! hands the payload back when the deadline passes.
//!
//! # Integration
//!
//! The timer sits inside a room actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         cmd = commands.recv() => { /* handle commands, maybe schedule */ }
//!         round = timer.wait() => { /* re-validate, then roll over */ }
//!     }
//! }
//! ```
//!
//! With nothing scheduled, [`DelayTimer::wait`] pends forever, so the
//! `select!` only ever wakes for commands. `wait` is cancel-safe: if the
//! other branch wins, the scheduled payload stays in place and the next
//! call to `wait` resumes waiting for the same deadline.
//!
//! Dropping the timer (for example when the room actor stops) discards
//! whatever was pending; there is no background task to clean up.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Lifetime counters for a [`DelayTimer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Calls to [`DelayTimer::schedule`].
    pub scheduled: u64,
    /// Deadlines that elapsed and returned their payload.
    pub fired: u64,
    /// Pending deadlines removed by [`DelayTimer::cancel`].
    pub cancelled: u64,
    /// Pending deadlines overwritten by a newer `schedule`.
    pub replaced: u64,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

struct Pending<T> {
    deadline: Instant,
    payload: T,
}

/// A single deferred payload that is released after a delay.
pub struct DelayTimer<T> {
    pending: Option<Pending<T>>,
    metrics: TimerMetrics,
}

impl<T> DelayTimer<T> {
    /// Creates an idle timer.
    pub fn new() -> Self {
        Self {
            pending: None,
            metrics: TimerMetrics::default(),
        }
    }

    /// Schedules `payload` to be released after `delay`.
    ///
    /// Replaces anything already pending; only the newest deadline fires.
    pub fn schedule(&mut self, delay: Duration, payload: T) {
        if self.pending.is_some() {
            self.metrics.replaced += 1;
            debug!(delay_ms = delay.as_millis() as u64, "replacing pending timer");
        }
        self.metrics.scheduled += 1;
        self.pending = Some(Pending {
            deadline: Instant::now() + delay,
            payload,
        });
        trace!(delay_ms = delay.as_millis() as u64, "timer scheduled");
    }

    /// Cancels the pending deadline, returning its payload if there was one.
    pub fn cancel(&mut self) -> Option<T> {
        let pending = self.pending.take()?;
        self.metrics.cancelled += 1;
        debug!("pending timer cancelled");
        Some(pending.payload)
    }

    /// Waits for the pending deadline and returns its payload.
    ///
    /// Pends forever when nothing is scheduled.
    pub async fn wait(&mut self) -> T {
        let Some(deadline) = self.deadline() else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        match self.pending.take() {
            Some(pending) => {
                self.metrics.fired += 1;
                let late_by = Instant::now().saturating_duration_since(pending.deadline);
                trace!(late_ms = late_by.as_millis() as u64, "timer fired");
                pending.payload
            }
            // `&mut self` is held across the sleep, so nothing can clear
            // `pending` before it completes.
            None => std::future::pending().await,
        }
    }

    /// Returns `true` if a deadline is scheduled.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The instant the pending payload will be released, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.deadline)
    }

    /// Peeks at the pending payload without cancelling it.
    pub fn payload(&self) -> Option<&T> {
        self.pending.as_ref().map(|p| &p.payload)
    }

    /// Lifetime counters.
    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}

impl<T> Default for DelayTimer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for DelayTimer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayTimer")
            .field("deadline", &self.deadline())
            .field("metrics", &self.metrics)
            .finish()
    }
}
