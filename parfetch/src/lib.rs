//! Parallel, range-based HTTP downloads to a local file.
//!
//! A [`Downloader`] probes the resource with a HEAD request. When the server
//! declares a size and accepts byte ranges, the body is split into
//! contiguous chunks that worker threads fetch concurrently and write at
//! their own offsets in one output file. Otherwise the body is streamed
//! sequentially. The first error cancels every other worker and is the one
//! reported.

mod config;
mod coordinator;
mod download;
mod error;
mod output;
mod plan;
mod probe;
mod request;
mod session;
mod single;
mod worker;

pub use config::{
    DEFAULT_BUFFER_SIZE, DEFAULT_MAX_BYTES_PER_THREAD, DEFAULT_MAX_THREADS, DEFAULT_TIMEOUT,
    DownloadConfig, GIB, KIB, MAX_BUFFER_SIZE, MAX_BYTES_PER_THREAD, MIB, MIN_BUFFER_SIZE,
    MIN_BYTES_PER_THREAD,
};
pub use download::{DownloadReport, Downloader, download};
pub use error::{ConfigError, DownloadError, Error};
pub use output::OutputFile;
pub use plan::{ChunkSpec, DownloadPlan, SingleReason, Strategy, partition, plan, thread_count};
pub use probe::{ResourceDescriptor, probe};
pub use request::{BodyFactory, RequestDescriptor};
pub use session::{CancelToken, ProgressFn};

pub use reqwest::Method;
pub use reqwest::blocking::Client;
