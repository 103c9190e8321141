//! Bounded, cancellable retry loop.
//!
//! [`retry_until`] runs an operation until a predicate says its value is
//! terminal, the attempt budget runs out, an overall deadline would be
//! crossed, or a [`CancellationToken`] fires. Waiting goes through the
//! [`Clock`] trait: production code uses [`TokioClock`], tests use
//! [`ManualClock`], which records every requested sleep and advances
//! virtual time instantly.
//!
//! ## Attempt accounting
//!
//! ```text
//! attempt 1 ─ op ─ terminal? ─ no ─ sleep(delay(1)) ─┐
//! attempt 2 ─ op ─ terminal? ─ no ─ sleep(delay(2)) ─┤
//!   …                                                │
//! attempt N ─ op ─ terminal? ─ no ─ Exhausted        │
//! ```
//!
//! There is never a sleep after the last attempt or after a terminal value,
//! so N attempts cost at most N-1 delays.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ── Clock ────────────────────────────────────────────────────────────────

/// Source of time for the retry loop.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Wall-clock time and `tokio::time::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` returns immediately after advancing time and
/// recording the requested duration.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move virtual time forward without recording a sleep.
    pub fn advance(&self, by: Duration) {
        let mut elapsed = self.elapsed.lock().unwrap_or_else(|e| e.into_inner());
        *elapsed += by;
    }

    /// Total virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every duration passed to [`Clock::sleep`], in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

// ── Policy ───────────────────────────────────────────────────────────────

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every attempt.
    Fixed(Duration),
    /// `initial`, `2 × initial`, `4 × initial`, … capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay to wait after the given 1-indexed attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(*max)
            }
        }
    }
}

/// Attempt budget, delay schedule and optional overall deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub deadline: Option<Duration>,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(interval),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// How a retry loop ended when the operation itself never errored.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryOutcome<S> {
    /// The predicate accepted `value`.
    Terminal { value: S, attempts: u32 },
    /// `max_attempts` values were observed, none terminal.
    Exhausted { last: Option<S>, attempts: u32 },
    /// The next delay would have crossed the deadline.
    DeadlineExceeded { last: Option<S>, attempts: u32 },
    /// The cancellation token fired.
    Cancelled { last: Option<S>, attempts: u32 },
}

impl<S> RetryOutcome<S> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Terminal { attempts, .. }
            | RetryOutcome::Exhausted { attempts, .. }
            | RetryOutcome::DeadlineExceeded { attempts, .. }
            | RetryOutcome::Cancelled { attempts, .. } => *attempts,
        }
    }
}

/// Run `op` until `is_terminal` accepts its value or the policy gives up.
///
/// `op` receives the 1-indexed attempt number. The first `Err` it returns
/// ends the loop and is propagated unchanged; classifying errors as
/// retryable is the caller's job.
///
/// Cancellation interrupts both an in-flight `op` and a pending sleep. An
/// interrupted attempt is not counted.
pub async fn retry_until<S, E, C, Op, Fut, Term>(
    policy: &RetryPolicy,
    clock: &C,
    cancel: &CancellationToken,
    mut op: Op,
    mut is_terminal: Term,
) -> Result<RetryOutcome<S>, E>
where
    C: Clock + ?Sized,
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<S, E>>,
    Term: FnMut(&S) -> bool,
{
    let start = clock.now();
    let mut last: Option<S> = None;

    for attempt in 1..=policy.max_attempts {
        if cancel.is_cancelled() {
            return Ok(RetryOutcome::Cancelled {
                last,
                attempts: attempt - 1,
            });
        }

        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(RetryOutcome::Cancelled { last, attempts: attempt - 1 });
            }
            value = op(attempt) => value?,
        };
        if is_terminal(&value) {
            return Ok(RetryOutcome::Terminal {
                value,
                attempts: attempt,
            });
        }
        last = Some(value);

        if attempt == policy.max_attempts {
            break;
        }

        let delay = policy.backoff.delay(attempt);
        if let Some(deadline) = policy.deadline {
            let elapsed = clock.now().saturating_duration_since(start);
            if elapsed + delay > deadline {
                debug!(
                    "retry: next delay {:?} would cross deadline {:?} after {} attempts",
                    delay, deadline, attempt
                );
                return Ok(RetryOutcome::DeadlineExceeded {
                    last,
                    attempts: attempt,
                });
            }
        }

        debug!("retry: attempt {}/{} not terminal, waiting {:?}", attempt, policy.max_attempts, delay);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Ok(RetryOutcome::Cancelled { last, attempts: attempt });
            }
            _ = clock.sleep(delay) => {}
        }
    }

    Ok(RetryOutcome::Exhausted {
        last,
        attempts: policy.max_attempts,
    })
}
