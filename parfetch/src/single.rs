use std::io::Read;

use reqwest::header::CONTENT_LENGTH;

use crate::download::Transfer;
use crate::error::{DownloadError, bad_status};
use crate::output::OutputFile;
use crate::session::ProgressReporter;

/// Streams the whole resource sequentially into the transfer's path.
///
/// The output file is only opened (and truncated) once the server has
/// answered with a success status. When a size is known, from the response
/// or from the probe, receiving fewer bytes is an error; otherwise the
/// stream simply runs until it ends.
pub(crate) fn run_single(
    transfer: Transfer<'_>,
    probed_size: Option<u64>,
) -> Result<u64, DownloadError> {
    let Transfer {
        client,
        request,
        path,
        config,
        progress,
        token,
    } = transfer;
    let url = request.url().as_str();
    let mut response = request.build(client).send().map_err(|err| {
        if err.is_timeout() {
            DownloadError::DeadlineExceeded {
                timeout: config.timeout(),
            }
        } else {
            DownloadError::transport(url, err)
        }
    })?;

    if !response.status().is_success() {
        return Err(bad_status(response));
    }

    let expected = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|text| text.trim().parse::<u64>().ok())
        .or(probed_size);

    let output = OutputFile::create(path)?;
    let reporter = ProgressReporter::new(expected, progress);
    let mut buffer = vec![0u8; config.buffer_len()];
    let mut written = 0u64;

    loop {
        if token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let read = response.read(&mut buffer).map_err(|source| {
            let err = DownloadError::BodyRead {
                offset: written,
                source,
            };
            if err.is_timeout() {
                DownloadError::DeadlineExceeded {
                    timeout: config.timeout(),
                }
            } else {
                err
            }
        })?;
        if read == 0 {
            break;
        }
        output.write_at(written, &buffer[..read])?;
        written += read as u64;
        reporter.add(read as u64);
    }

    if let Some(expected) = expected {
        if written < expected {
            return Err(DownloadError::Incomplete {
                expected,
                received: written,
            });
        }
    }

    Ok(written)
}
