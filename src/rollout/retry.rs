//! Bounded retry with per-caller exhaustion policy.
//!
//! Task rollout halts the whole run when a task cannot be accepted within
//! its attempts; benchmark variants abandon the task and move on. Both use
//! [`BoundedRetry`] and differ only in [`OnExhaustion`].

use std::future::Future;

use tracing::{error, info, warn};

/// What exhausting every attempt means for the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnExhaustion {
    /// Stop processing any further items.
    HaltAll,
    /// Give up on this item only.
    AbandonItem,
}

/// Result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attempt<T> {
    Done(T),
    /// The attempt finished but its outcome was rejected.
    Retry(String),
}

/// Result of a whole bounded retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Completed { value: T, attempts: u32 },
    Abandoned { attempts: u32, reason: String },
    Halted { attempts: u32, reason: String },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Completed { attempts, .. }
            | RetryOutcome::Abandoned { attempts, .. }
            | RetryOutcome::Halted { attempts, .. } => *attempts,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            RetryOutcome::Completed { value, .. } => Some(value),
            _ => None,
        }
    }
}

/// Runs an async operation up to `max_attempts` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRetry {
    max_attempts: u32,
    on_exhaustion: OnExhaustion,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32, on_exhaustion: OnExhaustion) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            on_exhaustion,
        }
    }

    pub fn halt_all(max_attempts: u32) -> Self {
        Self::new(max_attempts, OnExhaustion::HaltAll)
    }

    pub fn abandon_item(max_attempts: u32) -> Self {
        Self::new(max_attempts, OnExhaustion::AbandonItem)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Calls `op` with the 1-based attempt number until it returns
    /// [`Attempt::Done`] or the attempts run out. Errors from `op` end the
    /// loop immediately and are returned unchanged.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<RetryOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<Attempt<T>, E>>,
    {
        let mut reason = String::new();

        for attempt in 1..=self.max_attempts {
            info!(item = label, attempt, max = self.max_attempts, "Trial {} for {}", attempt, label);
            match op(attempt).await? {
                Attempt::Done(value) => {
                    return Ok(RetryOutcome::Completed {
                        value,
                        attempts: attempt,
                    })
                }
                Attempt::Retry(why) => {
                    warn!(item = label, attempt, reason = %why, "Attempt rejected");
                    reason = why;
                }
            }
        }

        let attempts = self.max_attempts;
        Ok(match self.on_exhaustion {
            OnExhaustion::HaltAll => {
                error!(item = label, attempts, "All attempts failed, halting");
                RetryOutcome::Halted { attempts, reason }
            }
            OnExhaustion::AbandonItem => {
                warn!(item = label, attempts, "Maximum retries reached, skipping");
                RetryOutcome::Abandoned { attempts, reason }
            }
        })
    }
}
