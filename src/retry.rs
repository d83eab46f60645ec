//! Backoff schedule and cancellable retry delays.
//!
//! The retry after failed attempt `a` (0-based) waits
//!
//! ```text
//! delay(a) = (a + 1) · 2 s + jitter,   jitter ∈ [0, 1) s
//! ```
//!
//! so the waits run roughly 2 s, 4 s, 6 s, … and are seconds at every depth.
//! `max_tries` counts attempts, not retries: the attempt numbered
//! `max_tries - 1` is the last, and its failure is terminal.
//!
//! A delay is awaited with [`Shutdown::sleep`], which returns early when a
//! [`ShutdownTrigger`] fires. The task never blocks a thread while waiting
//! and a process shutdown can rendezvous with any pending retry.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::watch;

/// Default attempt ceiling for one upload.
pub const DEFAULT_MAX_TRIES: u32 = 8;

/// Source of the sub-second jitter added to each delay.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Jitter {
    /// Uniform random value in `[0, 1)`. (default)
    #[default]
    Uniform,
    /// A fixed value, clamped to `[0, 1)`. Useful for reproducible runs.
    Fixed(f64),
}

impl Jitter {
    pub fn draw(&self) -> f64 {
        match self {
            Jitter::Uniform => rand::random::<f64>(),
            Jitter::Fixed(v) => v.clamp(0.0, 0.999_999),
        }
    }
}

/// Retry ceiling plus jitter source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_tries: u32,
    pub jitter: Jitter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: DEFAULT_MAX_TRIES,
            jitter: Jitter::default(),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt`.
    pub fn delay(attempt: u32, jitter: f64) -> Duration {
        Duration::from_secs_f64(f64::from(attempt + 1) * 2.0 + jitter)
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            attempt: 0,
            max_tries: self.max_tries.max(1),
            jitter: self.jitter,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryDecision {
    /// Wait this long, then run the next attempt.
    RetryAfter(Duration),
    /// The ceiling is reached; fail with the attempt count.
    GiveUp { attempts: u32 },
}

/// Per-task retry bookkeeping. Mutated only by the retry loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    max_tries: u32,
    jitter: Jitter,
}

impl RetryState {
    /// 0-based number of the attempt currently in flight.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Number of attempts started so far.
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }

    /// Record a failure of the current attempt.
    pub fn on_failure(&mut self) -> RetryDecision {
        if self.attempt + 1 >= self.max_tries {
            return RetryDecision::GiveUp {
                attempts: self.attempt + 1,
            };
        }
        let delay = RetryPolicy::delay(self.attempt, self.jitter.draw());
        self.attempt += 1;
        RetryDecision::RetryAfter(delay)
    }
}

// ── Shutdown ─────────────────────────────────────────────────────────────

/// Fires the shutdown signal observed by every [`Shutdown`] clone.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving side of the shutdown signal.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

/// Create a connected trigger / receiver pair.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx: Some(rx) })
}

impl Shutdown {
    /// A receiver that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once the trigger fires. Never resolves if the trigger was
    /// dropped without firing.
    pub async fn triggered(&self) {
        match &self.rx {
            None => std::future::pending::<()>().await,
            Some(rx) => {
                let mut rx = rx.clone();
                if rx.wait_for(|fired| *fired).await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    /// Wait for `delay`. Returns `false` if shutdown fired first.
    pub async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.triggered() => false,
        }
    }
}
