use log::{ error, warn };
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::SparkError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Flat backoff: the same delay before every retry, capped by total attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Delay before the attempt following `attempt`, or `None` when the cap is reached.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts { None } else { Some(self.delay) }
    }
}

/// Runs `attempt` until it succeeds, fails with a non-retryable error, the
/// policy is exhausted or `cancel` fires. Attempts are numbered from 1.
/// Cancellation ends the loop with `Ok(())`.
pub async fn supervise<F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut attempt: F
) -> Result<(), SparkError>
    where F: FnMut(u32) -> Fut, Fut: Future<Output = Result<(), SparkError>>
{
    let mut tries: u32 = 0;
    loop {
        tries += 1;
        let err = match attempt(tries).await {
            Ok(()) => {
                return Ok(());
            }
            Err(e) if !e.is_retryable() => {
                return Err(e);
            }
            Err(e) => e,
        };

        match policy.delay_after(tries) {
            Some(delay) => {
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    tries,
                    policy.max_attempts,
                    err,
                    delay
                );
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Ok(());
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                error!("Giving up after {} attempts: {}", tries, err);
                return Err(SparkError::RetryExhausted {
                    attempts: tries,
                    source: Box::new(err),
                });
            }
        }
    }
}
