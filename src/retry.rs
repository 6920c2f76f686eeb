//! Retry budget with linear backoff.

use std::{fmt::Display, time::Duration};

use crate::{cancel::CancelToken, events::EventSink};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug)]
pub enum RetryError<E> {
    Cancelled,
    Exhausted { attempts: u32, last: E },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the `failed_attempt`-th failure (1-based).
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        self.base_delay * failed_attempt
    }

    /// Runs `op` until it succeeds or the budget is spent. Cancellation is
    /// checked before every attempt and during every backoff sleep, and
    /// wins over any remaining attempts.
    pub fn run<T, E, F>(
        &self,
        cancel: &CancelToken,
        sink: &EventSink,
        what: &str,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    sink.warning(format!("Retry {attempt}: {what}: {err}"));
                    if !cancel.sleep(self.delay_for(attempt)) {
                        return Err(RetryError::Cancelled);
                    }
                    attempt += 1;
                }
                Err(err) => {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
            }
        }
    }
}
