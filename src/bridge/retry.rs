//! Retry with exponential backoff for IPC commands.
//!
//! An attempt fails when its response carries an `error` key. After a failed
//! attempt `n` the policy sleeps `initial_delay * 2^(n-1)` before trying
//! again; there is no jitter. When every attempt fails the last failure is
//! returned as-is. Cancelling the token during a backoff sleep abandons the
//! remaining attempts.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bridge::command::CommandResponse;
use crate::error::BridgeError;

/// Default number of attempts per command.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay after the first failed attempt.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(500);

/// Attempt budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    #[must_use]
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    /// Total attempts allowed.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the first failed attempt.
    #[must_use]
    pub const fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }

    /// Runs `attempt_fn` until it succeeds or the budget is spent.
    ///
    /// `attempt_fn` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Interrupted`] if `cancel` fires during a
    /// backoff sleep. Exhausting the budget is not an error: the last
    /// failure response is returned.
    pub async fn run<F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> Result<CommandResponse, BridgeError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = CommandResponse>,
    {
        let mut attempt = 1;
        loop {
            let response = attempt_fn(attempt).await;
            if !response.is_error() {
                return Ok(response);
            }

            if attempt >= self.max_attempts {
                debug!(attempts = attempt, "IPC attempts exhausted");
                return Ok(response);
            }

            let delay = self.delay_for_attempt(attempt);
            debug!(
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = response.error_message().as_deref().unwrap_or_default(),
                "IPC attempt failed, backing off"
            );

            tokio::select! {
                () = cancel.cancelled() => return Err(BridgeError::Interrupted { attempt }),
                () = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_INITIAL_DELAY)
    }
}
