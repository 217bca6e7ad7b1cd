use std::thread;

use crate::download::Transfer;
use crate::error::DownloadError;
use crate::output::OutputFile;
use crate::plan::ChunkSpec;
use crate::session::{DownloadSession, ProgressReporter};
use crate::worker::{WorkerExit, run_chunk};

/// Downloads every chunk on its own thread into one shared output file.
///
/// All workers are joined before the outcome is decided; none is killed.
/// The output file is closed exactly once, when the session is resolved
/// after the last join.
pub(crate) fn run_multi(
    transfer: Transfer<'_>,
    chunks: &[ChunkSpec],
    total: u64,
) -> Result<u64, DownloadError> {
    let Transfer {
        client,
        request,
        path,
        config,
        progress,
        token,
    } = transfer;

    let output = OutputFile::create(path)?;
    let session = DownloadSession::new(
        output,
        ProgressReporter::new(Some(total), progress),
        token,
        config,
        chunks.len(),
    );

    tracing::info!(
        "downloading {} bytes with {} connections into {}",
        total,
        chunks.len(),
        session.output().path().display()
    );

    let exits = thread::scope(|scope| {
        let handles: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let session = &session;
                let chunk = *chunk;
                scope.spawn(move || run_chunk(client, request, chunk, session))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| match handle.join() {
                Ok(exit) => exit,
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<String>()
                        .cloned()
                        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
                        .unwrap_or_else(|| "unknown panic".to_string());
                    session.fail(DownloadError::WorkerPanicked(message));
                    WorkerExit::Failed
                }
            })
            .collect::<Vec<_>>()
    });

    let count = |kind: WorkerExit| exits.iter().filter(|exit| **exit == kind).count();
    tracing::debug!(
        "workers joined: {} completed, {} failed, {} cancelled early",
        count(WorkerExit::Completed),
        count(WorkerExit::Failed),
        count(WorkerExit::CancelledEarly)
    );

    session.into_outcome()
}
