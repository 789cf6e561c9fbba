//! Retry controller with exponential backoff
//!
//! Wraps one download attempt and re-runs it on transient failures only.
//! The delay before retry `n` (0-based) is `base * 2^n`. Fatal errors
//! surface immediately; exhaustion surfaces the last transient error
//! annotated with the total attempt count.

use crate::error::{FetchError, Result};
use crate::output;
use std::time::Duration;

/// Base backoff between retries
const RETRY_BACKOFF_BASE: Duration = Duration::from_secs(2);

/// Run `operation` up to `1 + retries` times, backing off between attempts.
pub fn with_retry<T>(retries: u32, operation: impl FnMut() -> Result<T>) -> Result<T> {
    with_retry_backoff(retries, RETRY_BACKOFF_BASE, operation)
}

/// Internal: retry loop with configurable backoff base (for testing)
fn with_retry_backoff<T>(
    retries: u32,
    base: Duration,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt: u32 = 0;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < retries => {
                let wait = base * 2u32.saturating_pow(attempt);
                output::warning(&format!(
                    "transient error: {e}; backing off {:.1}s before retry {}/{}",
                    wait.as_secs_f64(),
                    attempt + 1,
                    retries
                ));
                std::thread::sleep(wait);
                attempt += 1;
            }
            Err(e) if e.is_transient() => {
                return Err(FetchError::RetriesExhausted {
                    attempts: attempt + 1,
                    source: Box::new(e),
                });
            }
            Err(e) => return Err(e),
        }
    }
}
