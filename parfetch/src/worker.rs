use std::io::Read;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_RANGE, HeaderMap, RANGE};

use crate::error::{DownloadError, bad_status};
use crate::plan::ChunkSpec;
use crate::request::RequestDescriptor;
use crate::session::DownloadSession;

/// How a worker's run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum WorkerExit {
    Completed,
    Failed,
    CancelledEarly,
}

/// Fetches one byte range and writes it at the matching offset of the
/// session's output file.
///
/// Any failure is recorded in the session, which cancels the siblings. A
/// worker that sees the session cancelled stops without reporting anything
/// itself.
pub(crate) fn run_chunk(
    client: &Client,
    request: &RequestDescriptor,
    chunk: ChunkSpec,
    session: &DownloadSession,
) -> WorkerExit {
    match fetch_chunk(client, request, chunk, session) {
        Ok(WorkerExit::Completed) => {
            tracing::debug!(
                "part {} finished ({}-{})",
                chunk.index,
                chunk.start,
                chunk.end
            );
            session.mark_completed();
            WorkerExit::Completed
        }
        Ok(exit) => {
            tracing::debug!("part {} stopped early after cancellation", chunk.index);
            exit
        }
        Err(err) => {
            session.fail(err);
            WorkerExit::Failed
        }
    }
}

fn fetch_chunk(
    client: &Client,
    request: &RequestDescriptor,
    chunk: ChunkSpec,
    session: &DownloadSession,
) -> Result<WorkerExit, DownloadError> {
    if session.is_cancelled() {
        return Ok(WorkerExit::CancelledEarly);
    }

    tracing::debug!("part {} requesting {}", chunk.index, chunk.range_header());
    let mut response = request
        .build(client)
        .header(RANGE, chunk.range_header())
        .send()
        .map_err(|err| DownloadError::transport(request.url().as_str(), err))?;

    match response.status() {
        StatusCode::PARTIAL_CONTENT => {
            if let Some(start) = content_range_start(response.headers()) {
                if start != chunk.start {
                    return Err(DownloadError::RangeNotHonored {
                        requested: chunk.start,
                    });
                }
            }
        }
        // a full body only lines up with the first chunk
        StatusCode::OK if chunk.start == 0 => {}
        StatusCode::OK => {
            return Err(DownloadError::RangeNotHonored {
                requested: chunk.start,
            });
        }
        _ => return Err(bad_status(response)),
    }

    let part_length = chunk.size();
    let mut cursor = chunk.start;
    let mut remaining = part_length;
    let mut buffer = vec![0u8; session.buffer_len().min(clamp_len(part_length))];

    while remaining > 0 {
        if session.is_cancelled() {
            return Ok(WorkerExit::CancelledEarly);
        }

        let to_read = clamp_len(remaining).min(buffer.len());
        let read = response
            .read(&mut buffer[..to_read])
            .map_err(|source| DownloadError::BodyRead {
                offset: cursor,
                source,
            })?;
        if read == 0 {
            break;
        }

        session.output().write_at(cursor, &buffer[..read])?;
        cursor += read as u64;
        remaining -= read as u64;
        session.progress().add(read as u64);
    }

    if remaining > 0 {
        return Err(DownloadError::Incomplete {
            expected: part_length,
            received: part_length - remaining,
        });
    }

    Ok(WorkerExit::Completed)
}

fn clamp_len(bytes: u64) -> usize {
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

/// First byte position of a `Content-Range: bytes <start>-<end>/<size>`
/// header, if one is present and readable.
fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}
