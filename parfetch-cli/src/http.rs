use anyhow::{Context, Result, anyhow};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use reqwest::blocking::Client;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = concat!("parfetch-cli/", env!("CARGO_PKG_VERSION"));
const FALLBACK_FILE_NAME: &str = "download";

pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Parses `input`, assuming `http://` when no scheme is given.
pub fn normalize_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("URL is required");
    }
    match Url::parse(trimmed) {
        Ok(url) if url.has_host() => Ok(url),
        _ => Url::parse(&format!("http://{}", trimmed))
            .with_context(|| format!("invalid URL {}", trimmed)),
    }
}

/// Last non-empty path segment of `url`, percent-decoded, or `download`.
pub fn default_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(|segment| {
            percent_decode_str(segment)
                .decode_utf8_lossy()
                .replace(['/', '\\'], "_")
        })
        .filter(|name| !name.trim().is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

/// Splits a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header {:?} must look like 'Name: value'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header {:?} has an empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}
