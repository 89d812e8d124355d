//! Bounded retry with a fixed backoff.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

/// How often an operation is attempted and how long to sleep in between.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no sleeping.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

/// Call `op` until it succeeds or `policy.attempts` calls have failed.
///
/// `op` receives the 1-based attempt number. A policy with zero attempts
/// still calls `op` once.
pub fn retry<T, E, F>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(err) if attempt < attempts => {
                log::warn!("attempt {attempt}/{attempts} failed: {err}");
                if !policy.backoff.is_zero() {
                    thread::sleep(policy.backoff);
                }
                attempt += 1;
            }
            Err(last) => {
                log::error!("attempt {attempt}/{attempts} failed: {last}; giving up");
                return Err(RetryError::Exhausted { attempts, last });
            }
        }
    }
}
