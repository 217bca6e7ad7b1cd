//! State shared by every worker of one multi-stream attempt.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::output::OutputFile;

/// Progress callback: `(downloaded_bytes, total_bytes)`.
///
/// Calls are serialized by the engine and `downloaded_bytes` never goes
/// down within one attempt. `total_bytes` is `None` when the size of the
/// resource is unknown.
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Level-triggered cancellation shared by everyone taking part in an
/// attempt.
///
/// Once raised it stays raised. An armed deadline raises the token the
/// first time anyone polls it after the deadline has passed, and the token
/// remembers that the deadline was the cause.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    deadline_hit: AtomicBool,
    deadline: OnceLock<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        self.expire_if_due()
    }

    /// True once the deadline, rather than a caller or a failing worker,
    /// has raised the token.
    pub fn deadline_elapsed(&self) -> bool {
        self.inner.deadline_hit.load(Ordering::SeqCst)
    }

    /// Sets the deadline `timeout` from now. Only the first call has an
    /// effect.
    pub(crate) fn arm_deadline(&self, timeout: Duration) {
        let _ = self.inner.deadline.set(Instant::now() + timeout);
    }

    /// Raises the token if the deadline has passed and reports whether it
    /// has.
    pub(crate) fn expire_if_due(&self) -> bool {
        let due = self
            .inner
            .deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline);
        if due && !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            self.inner.deadline_hit.store(true, Ordering::SeqCst);
        }
        due
    }
}

/// Aggregate byte counter with an optional, serialized callback.
pub(crate) struct ProgressReporter {
    downloaded: AtomicU64,
    total: Option<u64>,
    callback: Option<ProgressFn>,
    gate: Mutex<()>,
}

impl fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("downloaded", &self.downloaded)
            .field("total", &self.total)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl ProgressReporter {
    pub(crate) fn new(total: Option<u64>, callback: Option<ProgressFn>) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            total,
            callback,
            gate: Mutex::new(()),
        }
    }

    pub(crate) fn add(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::SeqCst);
        if let Some(callback) = &self.callback {
            let _guard = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
            // load under the gate so callers observe a non-decreasing value
            callback(self.downloaded.load(Ordering::SeqCst), self.total);
        }
    }

    pub(crate) fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::SeqCst)
    }
}

/// Everything the workers of one multi-stream attempt share.
#[derive(Debug)]
pub(crate) struct DownloadSession {
    output: OutputFile,
    progress: ProgressReporter,
    first_error: OnceLock<DownloadError>,
    token: CancelToken,
    timeout: Duration,
    buffer_len: usize,
    completed: AtomicUsize,
    chunk_count: usize,
}

impl DownloadSession {
    pub(crate) fn new(
        output: OutputFile,
        progress: ProgressReporter,
        token: CancelToken,
        config: &DownloadConfig,
        chunk_count: usize,
    ) -> Self {
        token.arm_deadline(config.timeout());
        Self {
            output,
            progress,
            first_error: OnceLock::new(),
            token,
            timeout: config.timeout(),
            buffer_len: config.buffer_len(),
            completed: AtomicUsize::new(0),
            chunk_count,
        }
    }

    pub(crate) fn output(&self) -> &OutputFile {
        &self.output
    }

    pub(crate) fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub(crate) fn buffer_len(&self) -> usize {
        self.buffer_len
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Records `err` unless an earlier failure already won, then raises
    /// cancellation. Failures that surface after the deadline are dropped
    /// so the attempt resolves to [`DownloadError::DeadlineExceeded`].
    pub(crate) fn fail(&self, err: DownloadError) {
        if self.token.expire_if_due() && self.first_error.get().is_none() {
            tracing::debug!("ignoring error after deadline: {}", err);
            return;
        }
        match self.first_error.set(err) {
            Ok(()) => {
                if let Some(recorded) = self.first_error.get() {
                    tracing::warn!("download worker failed: {}", recorded);
                }
            }
            Err(later) => tracing::debug!("discarding later worker error: {}", later),
        }
        self.token.cancel();
    }

    pub(crate) fn mark_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// Resolves the attempt once every worker has returned. Consumes the
    /// session, which closes the output file.
    pub(crate) fn into_outcome(self) -> Result<u64, DownloadError> {
        let downloaded = self.progress.downloaded();
        if let Some(err) = self.first_error.into_inner() {
            return Err(err);
        }
        if self.completed.load(Ordering::SeqCst) == self.chunk_count {
            return Ok(downloaded);
        }
        if self.token.deadline_elapsed() {
            return Err(DownloadError::DeadlineExceeded {
                timeout: self.timeout,
            });
        }
        Err(DownloadError::Cancelled)
    }
}
