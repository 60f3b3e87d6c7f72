// src/judge/backoff.rs
//! Per-batch retry state machine.
//!
//! ```text
//! PENDING → CALLING(1) ─ok──────────────────────────→ SUCCEEDED
//!              │ transient, attempt < max
//!              └→ RETRYING(1, base) → CALLING(2) ─ok→ SUCCEEDED
//!                     ...                 │ permanent, or attempt == max
//!                                         └────────→ FAILED
//! ```
//!
//! The delay after failed attempt `k` is `base · 2^(k-1)`. Sleeping goes through
//! [`Sleeper`] so tests can observe delays without waiting.

use std::time::Duration;

use async_trait::async_trait;

use super::client::JudgeError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(12);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Wait after the `attempt`-th (1-based) failed call.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Pending,
    Calling { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Succeeded { attempts: u32 },
    Failed { attempts: u32 },
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Succeeded { .. } | BatchState::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct BatchRetry {
    policy: RetryPolicy,
    state: BatchState,
    attempts: u32,
    waited: Duration,
}

impl BatchRetry {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy: RetryPolicy {
                max_attempts: policy.max_attempts.max(1),
                ..policy
            },
            state: BatchState::Pending,
            attempts: 0,
            waited: Duration::ZERO,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Total backoff scheduled so far.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Enter CALLING. Returns the attempt number, or `None` from a terminal state.
    pub fn begin_call(&mut self) -> Option<u32> {
        match self.state {
            BatchState::Pending | BatchState::Retrying { .. } => {
                self.attempts += 1;
                self.state = BatchState::Calling {
                    attempt: self.attempts,
                };
                Some(self.attempts)
            }
            _ => None,
        }
    }

    pub fn succeed(&mut self) -> BatchState {
        self.state = BatchState::Succeeded {
            attempts: self.attempts,
        };
        self.state
    }

    /// Record a failed call; the returned state is RETRYING (sleep `delay`, then
    /// call again) or FAILED.
    pub fn fail(&mut self, err: &JudgeError) -> BatchState {
        self.state = if err.is_transient() && self.attempts < self.policy.max_attempts {
            let delay = self.policy.delay_after(self.attempts);
            self.waited += delay;
            BatchState::Retrying {
                attempt: self.attempts,
                delay,
            }
        } else {
            BatchState::Failed {
                attempts: self.attempts,
            }
        };
        self.state
    }
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}
