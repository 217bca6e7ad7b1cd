use crate::config::AppConfig;
use crate::http::{
    DEFAULT_USER_AGENT, build_client, default_file_name, normalize_url, parse_header,
};
use crate::interrupt::ActiveDownloadGuard;
use crate::progress::{TransferBar, connection_message};
use crate::retry::retry;
use anyhow::{Context, Result};
use parfetch::{
    DownloadConfig, DownloadError, DownloadReport, Downloader, RequestDescriptor, Strategy,
};
use reqwest::{Method, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Options of the `get` command as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct GetArgs {
    pub url: String,
    pub out: Option<PathBuf>,
    pub threads: Option<usize>,
    pub per_thread: Option<u64>,
    pub buffer: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub headers: Vec<String>,
    pub method: String,
    pub data: Option<String>,
    pub quiet: bool,
}

pub fn get(args: &GetArgs, config: &AppConfig, max_attempts: usize) -> Result<()> {
    let url = normalize_url(&args.url)?;
    let out = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_file_name(&url)));
    let download_config = resolve_download_config(args, config);
    let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
    let client = build_client(user_agent, download_config.timeout())?;
    let request = build_request(args, &url, config)?;
    let label = out
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| out.display().to_string());

    tracing::debug!(
        "get {} -> {} ({:?})",
        request.url(),
        out.display(),
        download_config
    );

    let report = retry("download", max_attempts, |attempt| {
        let progress = TransferBar::new(&label, args.quiet);
        if attempt > 1 {
            progress.set_message(format!(" (attempt {attempt})"));
        }
        let sink = progress.clone();
        let downloader = Downloader::with_client(
            client.clone(),
            request.clone(),
            &out,
            download_config.clone(),
        )
        .context("invalid download target")?
        .on_progress(move |done, total| sink.update(done, total));

        let _active = ActiveDownloadGuard::new(downloader.cancel_token());
        match downloader.run() {
            Ok(report) => {
                progress.finish("");
                Ok(report)
            }
            Err(err) => {
                progress.abandon();
                Err(describe_failure(err, &out))
            }
        }
    })?;

    if !args.quiet {
        println!("{}", summary(&report));
    }
    Ok(())
}

fn describe_failure(err: DownloadError, out: &Path) -> anyhow::Error {
    let preserved = matches!(err, DownloadError::Cancelled) && out.exists();
    let err = anyhow::Error::new(err);
    if preserved {
        err.context(format!(
            "download cancelled; partial file preserved at {}",
            out.display()
        ))
    } else {
        err.context(format!("failed to download into {}", out.display()))
    }
}

fn summary(report: &DownloadReport) -> String {
    let how = match report.strategy {
        Strategy::Multi => format!("parallel{}", connection_message(report.chunk_count)),
        Strategy::Single(reason) => format!("single stream, {}", reason),
    };
    format!(
        "Saved {} ({} bytes, {})",
        report.path.display(),
        report.bytes_written,
        how
    )
}

/// Flag beats config file beats built-in default, field by field.
pub fn resolve_download_config(args: &GetArgs, config: &AppConfig) -> DownloadConfig {
    let defaults = DownloadConfig::new();
    let buffer = args
        .buffer
        .or(config.buffer_size)
        .unwrap_or(defaults.buffer_size());
    let threads = args
        .threads
        .or(config.max_threads)
        .unwrap_or(defaults.max_threads());
    let per_thread = args
        .per_thread
        .or(config.max_bytes_per_thread)
        .unwrap_or(defaults.max_bytes_per_thread());
    let timeout = args
        .timeout_secs
        .or(config.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(defaults.timeout());

    DownloadConfig::new()
        .with_buffer_size(buffer)
        .with_multi_thread(threads, per_thread)
        .with_timeout(timeout)
}

fn build_request(args: &GetArgs, url: &Url, config: &AppConfig) -> Result<RequestDescriptor> {
    let method_name = if args.method.trim().is_empty() {
        "GET".to_string()
    } else {
        args.method.trim().to_ascii_uppercase()
    };
    let method = Method::from_bytes(method_name.as_bytes())
        .with_context(|| format!("invalid HTTP method {}", method_name))?;

    let mut request = RequestDescriptor::new(method, url.as_str())?;
    for (name, value) in &config.headers {
        request = request.header(name, value)?;
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(&name, &value)?;
    }
    if let Some(data) = &args.data {
        request = request.body_bytes(data.clone().into_bytes());
    }
    Ok(request)
}
