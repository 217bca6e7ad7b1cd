use anyhow::{Error, Result};
use parfetch::DownloadError;
use reqwest::StatusCode;
use std::thread;
use std::time::Duration;

use crate::interrupt;

/// Runs `func` until it succeeds, fails with something not worth
/// retrying, or `max_attempts` is used up.
pub fn retry<T, F>(operation: &str, max_attempts: usize, mut func: F) -> Result<T>
where
    F: FnMut(usize) -> Result<T>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match func(attempt) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt >= attempts || interrupt::interrupted() || !is_retryable_error(&err) {
            return Err(err);
        }
        let delay = retry_delay(attempt);
        eprintln!(
            "{} failed (attempt {}/{}): {}. Retrying in {}s...",
            operation,
            attempt,
            attempts,
            err,
            delay.as_secs()
        );
        thread::sleep(delay);
        attempt += 1;
    }
}

/// Upper bound of the time spent sleeping between `attempts` tries.
pub fn total_retry_sleep_seconds(attempts: usize) -> u64 {
    (1..attempts.max(1))
        .map(|attempt| retry_delay(attempt).as_secs())
        .sum()
}

fn retry_delay(attempt: usize) -> Duration {
    let capped = attempt.saturating_sub(1).min(3) as u32;
    Duration::from_secs(1 << capped)
}

fn is_retryable_error(err: &Error) -> bool {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DownloadError>())
        .is_some_and(is_retryable_download_error)
}

fn is_retryable_download_error(err: &DownloadError) -> bool {
    match err {
        DownloadError::DeadlineExceeded { .. }
        | DownloadError::Transport { .. }
        | DownloadError::BodyRead { .. }
        | DownloadError::Incomplete { .. } => true,
        DownloadError::BadStatus { status, .. } => {
            status.is_server_error()
                || *status == StatusCode::TOO_MANY_REQUESTS
                || *status == StatusCode::REQUEST_TIMEOUT
        }
        DownloadError::Cancelled
        | DownloadError::RangeNotHonored { .. }
        | DownloadError::ShortWrite { .. }
        | DownloadError::Io { .. }
        | DownloadError::WorkerPanicked(_) => false,
    }
}
