//! Backoff schedule for ledger appends.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

/// How many times, and how far apart, a failed append is tried again.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total tries, the first one included. At least 1.
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of each delay added or removed at random, in `0.0..=1.0`.
    pub jitter: f64,
}

/// The error of the last attempt, with how many attempts were made.
#[derive(Debug, Clone, PartialEq)]
pub struct GaveUp<E> {
    pub attempts: usize,
    pub last_error: E,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration, jitter: f64) -> Self {
        let base_delay = base_delay.max(Duration::from_millis(1));
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: if jitter.is_finite() {
                jitter.clamp(0.0, 1.0)
            } else {
                0.0
            },
        }
    }

    /// Policy for ledger appends with `attempts` total tries.
    pub fn ledger_append(attempts: usize) -> Self {
        Self::new(
            attempts,
            Duration::from_millis(50),
            Duration::from_secs(1),
            0.2,
        )
    }

    /// Pause after the `failures`-th consecutive failure (1-based).
    fn backoff(&self, failures: usize) -> Duration {
        let shift = u32::try_from(failures.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 1_u32.checked_shl(shift).unwrap_or(u32::MAX);
        let delay = self.base_delay.saturating_mul(factor).min(self.max_delay);
        if self.jitter == 0.0 {
            return delay;
        }
        let scale = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        delay.mul_f64(scale)
    }

    /// Runs `op` until it succeeds, fails with an error `is_transient`
    /// rejects, or `max_attempts` is used up. `op` receives the zero-based
    /// attempt number.
    pub async fn run<F, Fut, T, E>(
        &self,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, GaveUp<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempts = 0;
        loop {
            let err = match op(attempts).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            attempts += 1;
            if attempts >= self.max_attempts || !is_transient(&err) {
                return Err(GaveUp {
                    attempts,
                    last_error: err,
                });
            }
            sleep(self.backoff(attempts)).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ledger_append(3)
    }
}
