use reqwest::Method;
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH};

use crate::request::RequestDescriptor;

/// What a HEAD request revealed about the remote resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Declared length; `None` when missing, unparseable or zero.
    pub total_size: Option<u64>,
    /// The server advertised `Accept-Ranges: bytes`.
    pub supports_ranges: bool,
    /// The probe itself round-tripped with a 2xx status.
    pub status_ok: bool,
}

impl ResourceDescriptor {
    /// The value used when the probe could not learn anything.
    pub fn unavailable() -> Self {
        Self {
            total_size: None,
            supports_ranges: false,
            status_ok: false,
        }
    }
}

/// Sends `request` as a HEAD request and reads size and range support from
/// the answer.
///
/// Failure here is never fatal: a transport error or a non-2xx status
/// yields [`ResourceDescriptor::unavailable`] and the caller falls back to a
/// single stream.
pub fn probe(client: &Client, request: &RequestDescriptor) -> ResourceDescriptor {
    let response = match request.build_with_method(client, Method::HEAD).send() {
        Ok(response) => response,
        Err(err) => {
            tracing::info!("probe of {} failed: {}", request.url(), err);
            return ResourceDescriptor::unavailable();
        }
    };

    if !response.status().is_success() {
        tracing::info!(
            "probe of {} returned {}; range support unknown",
            request.url(),
            response.status()
        );
        return ResourceDescriptor::unavailable();
    }

    let descriptor = describe(&response);
    tracing::debug!(
        "probe of {}: size={:?} ranges={}",
        request.url(),
        descriptor.total_size,
        descriptor.supports_ranges
    );
    descriptor
}

fn describe(response: &Response) -> ResourceDescriptor {
    let total_size = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse::<u64>().ok())
        .filter(|length| *length > 0);

    let supports_ranges = response
        .headers()
        .get_all(ACCEPT_RANGES)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(advertises_bytes);

    ResourceDescriptor {
        total_size,
        supports_ranges,
        status_ok: true,
    }
}

fn advertises_bytes(value: &str) -> bool {
    value.to_ascii_lowercase().contains("bytes")
}
