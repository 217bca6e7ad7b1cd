use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::blocking::Client;

use crate::config::DownloadConfig;
use crate::coordinator::run_multi;
use crate::error::{ConfigError, DownloadError};
use crate::output::ensure_parent_dir;
use crate::plan::{DownloadPlan, Strategy, plan};
use crate::probe::probe;
use crate::request::RequestDescriptor;
use crate::session::{CancelToken, ProgressFn};
use crate::single::run_single;

const USER_AGENT: &str = concat!("parfetch/", env!("CARGO_PKG_VERSION"));

/// Summary of a finished download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadReport {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub strategy: Strategy,
    /// Zero for single-stream downloads.
    pub chunk_count: usize,
}

/// Everything one execution path needs to move bytes to disk.
pub(crate) struct Transfer<'a> {
    pub(crate) client: &'a Client,
    pub(crate) request: &'a RequestDescriptor,
    pub(crate) path: &'a Path,
    pub(crate) config: &'a DownloadConfig,
    pub(crate) progress: Option<ProgressFn>,
    pub(crate) token: CancelToken,
}

/// Downloads one resource to one local path.
///
/// A HEAD probe decides whether the transfer is split into byte ranges
/// fetched in parallel or kept on a single stream. Either way the result is
/// the same bytes at `save_path`.
///
/// ```no_run
/// use parfetch::{DownloadConfig, Downloader, RequestDescriptor};
///
/// let request = RequestDescriptor::get("https://example.com/big.iso")?;
/// let report = Downloader::new(request, "big.iso", DownloadConfig::new())?
///     .on_progress(|done, total| eprintln!("{done}/{total:?}"))
///     .run()?;
/// println!("{} bytes", report.bytes_written);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Downloader {
    client: Client,
    request: RequestDescriptor,
    save_path: PathBuf,
    config: DownloadConfig,
    progress: Option<ProgressFn>,
    token: CancelToken,
}

impl Downloader {
    pub fn new(
        request: RequestDescriptor,
        save_path: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .map_err(ConfigError::Client)?;
        Self::with_client(client, request, save_path, config)
    }

    /// Uses a caller-built client. Its own timeout, if any, bounds each
    /// request; the configured timeout still bounds a parallel download.
    pub fn with_client(
        client: Client,
        request: RequestDescriptor,
        save_path: impl Into<PathBuf>,
        config: DownloadConfig,
    ) -> Result<Self, ConfigError> {
        let save_path = save_path.into();
        if save_path.as_os_str().is_empty() {
            return Err(ConfigError::NoSavePath);
        }
        Ok(Self {
            client,
            request,
            save_path,
            config,
            progress: None,
            token: CancelToken::new(),
        })
    }

    /// Called with `(downloaded, total)` after every write. Calls never
    /// overlap and `downloaded` never goes backwards.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(u64, Option<u64>) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// A handle that stops the download when cancelled from any thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Probes the resource and returns the plan `run` would follow,
    /// without touching the filesystem.
    pub fn plan(&self) -> DownloadPlan {
        plan(&probe(&self.client, &self.request), &self.config)
    }

    /// Fetches the resource. A token cancelled before the transfer starts
    /// leaves any existing file at `save_path` untouched.
    pub fn run(self) -> Result<DownloadReport, DownloadError> {
        ensure_parent_dir(&self.save_path)?;

        let plan = self.plan();
        match plan.strategy {
            Strategy::Single(reason) => {
                tracing::info!("fetching {} on a single stream: {}", self.request.url(), reason)
            }
            Strategy::Multi => tracing::info!(
                "fetching {} in {} parts",
                self.request.url(),
                plan.chunks.len()
            ),
        }

        if self.token.is_cancelled() {
            tracing::info!("download cancelled before transfer started");
            return Err(DownloadError::Cancelled);
        }

        let transfer = Transfer {
            client: &self.client,
            request: &self.request,
            path: &self.save_path,
            config: &self.config,
            progress: self.progress.clone(),
            token: self.token.clone(),
        };
        let bytes_written = match plan.strategy {
            Strategy::Multi => {
                let total = plan.total_size.unwrap_or_default();
                run_multi(transfer, &plan.chunks, total)?
            }
            Strategy::Single(_) => run_single(transfer, plan.total_size)?,
        };

        tracing::info!(
            "saved {} bytes to {}",
            bytes_written,
            self.save_path.display()
        );
        Ok(DownloadReport {
            path: self.save_path,
            bytes_written,
            strategy: plan.strategy,
            chunk_count: plan.chunks.len(),
        })
    }
}

/// Fetches `url` with a plain GET into `save_path`.
pub fn download(
    url: &str,
    save_path: impl AsRef<Path>,
    config: DownloadConfig,
) -> Result<DownloadReport, crate::Error> {
    let request = RequestDescriptor::get(url)?;
    let report = Downloader::new(request, save_path.as_ref(), config)?.run()?;
    Ok(report)
}
