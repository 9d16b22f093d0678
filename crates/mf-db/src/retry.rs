//! Exponential backoff for establishing connections.

use crate::error::{DbError, DbResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Connection attempts before giving up (1s + 2s + ... + 32s of waiting)
pub const NUM_CONNECT_ATTEMPTS: u32 = 7;

/// Wait after the first failed attempt; doubles after every failure
pub const INITIAL_RETRY_WAIT: Duration = Duration::from_secs(1);

/// Run `op` until it succeeds, at most `attempts` times.
///
/// Every failure but the last is followed by a wait that starts at
/// `initial_wait` and doubles. Each wait races `cancel`; cancellation
/// always wins and yields [`DbError::Cancelled`]. When every attempt
/// fails the last error is returned inside [`DbError::RetriesExhausted`].
pub async fn retry_exponential<T, F, Fut>(
    cancel: &CancellationToken,
    attempts: u32,
    initial_wait: Duration,
    mut op: F,
) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let attempts = attempts.max(1);
    let mut wait = initial_wait;
    let mut attempt = 0;

    loop {
        attempt += 1;
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= attempts {
            log::error!("attempt {attempt}/{attempts} failed, giving up: {err}");
            return Err(DbError::RetriesExhausted {
                attempts,
                last: Box::new(err),
            });
        }

        log::debug!("attempt {attempt}/{attempts} failed: {err}; retrying in {wait:?}");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(DbError::Cancelled),
            _ = tokio::time::sleep(wait) => {}
        }
        wait = wait.saturating_mul(2);
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
