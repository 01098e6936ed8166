use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// How many times to try, and how long to wait between tries.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// `None` retries immediately; otherwise the first of an exponentially growing delay.
    pub initial_delay: Option<Duration>,
}

impl RetryPolicy {
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: None,
        }
    }

    pub const fn with_backoff(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay: Some(initial_delay),
        }
    }

    fn backoff(&self) -> Option<ExponentialBackoff> {
        self.initial_delay.map(|initial| ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: initial * 32,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("gave up after {attempts} attempt(s): {last_error}")]
pub struct RetryExhausted<E: std::fmt::Display> {
    pub attempts: u32,
    pub last_error: E,
}

/// Run `attempt` until `accept` turns its output into a value, at most `policy.max_attempts` times.
///
/// `attempt` receives the 1-based attempt number. A policy with zero attempts is
/// treated as one.
pub async fn retry_bounded<A, T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut attempt: F,
    mut accept: P,
) -> Result<T, RetryExhausted<E>>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = A>,
    P: FnMut(u32, A) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = policy.backoff();
    let mut number = 1;

    loop {
        let output = attempt(number).await;
        match accept(number, output) {
            Ok(value) => return Ok(value),
            Err(error) if number >= max_attempts => {
                return Err(RetryExhausted {
                    attempts: number,
                    last_error: error,
                })
            }
            Err(error) => {
                debug!("Attempt {}/{} failed: {}", number, max_attempts, error);
                if let Some(delay) = delays.as_mut().and_then(|b| b.next_backoff()) {
                    tokio::time::sleep(delay).await;
                }
                number += 1;
            }
        }
    }
}
