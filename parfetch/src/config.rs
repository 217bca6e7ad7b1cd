use std::time::Duration;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

pub const DEFAULT_BUFFER_SIZE: u64 = 5 * MIB;
pub const MIN_BUFFER_SIZE: u64 = 5;
pub const MAX_BUFFER_SIZE: u64 = GIB;

pub const DEFAULT_MAX_THREADS: usize = 20;

pub const DEFAULT_MAX_BYTES_PER_THREAD: u64 = 100 * MIB;
pub const MIN_BYTES_PER_THREAD: u64 = 5;
pub const MAX_BYTES_PER_THREAD: u64 = 10 * GIB;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Tuning knobs consumed by the download engine.
///
/// Setters ignore out-of-range input and keep the previous value, so a
/// config is always usable as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadConfig {
    buffer_size: u64,
    max_threads: usize,
    max_bytes_per_thread: u64,
    timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_threads: DEFAULT_MAX_THREADS,
            max_bytes_per_thread: DEFAULT_MAX_BYTES_PER_THREAD,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DownloadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size of the read buffer used by every stream, in bytes
    /// (5 B ..= 1 GiB).
    pub fn with_buffer_size(mut self, size: u64) -> Self {
        if (MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&size) {
            self.buffer_size = size;
        }
        self
    }

    /// Caps the worker count and sets how many bytes one worker should
    /// handle before another one is added. The per-worker size only
    /// matters while the natural worker count stays below `max_threads`.
    pub fn with_multi_thread(mut self, max_threads: usize, max_bytes_per_thread: u64) -> Self {
        if max_threads >= 1 {
            self.max_threads = max_threads;
        }
        if (MIN_BYTES_PER_THREAD..=MAX_BYTES_PER_THREAD).contains(&max_bytes_per_thread) {
            self.max_bytes_per_thread = max_bytes_per_thread;
        }
        self
    }

    /// Overall timeout: applied to the HTTP client and used as the deadline
    /// of a multi-stream attempt.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.timeout = timeout;
        }
        self
    }

    pub fn buffer_size(&self) -> u64 {
        self.buffer_size
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn max_bytes_per_thread(&self) -> u64 {
        self.max_bytes_per_thread
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn buffer_len(&self) -> usize {
        usize::try_from(self.buffer_size).unwrap_or(usize::MAX)
    }
}
