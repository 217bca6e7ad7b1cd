use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use crate::error::DownloadError;

/// The destination file of one attempt.
///
/// Writes are positional, so several workers can share one handle as long
/// as their byte ranges never overlap. The handle is closed when the owner
/// drops it.
#[derive(Debug)]
pub struct OutputFile {
    path: PathBuf,
    file: File,
}

impl OutputFile {
    /// Opens `path` for writing, creating missing parent directories and
    /// truncating anything already there.
    pub fn create(path: &Path) -> Result<Self, DownloadError> {
        ensure_parent_dir(path)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|err| DownloadError::io(path, err))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `buf` at `offset`. Anything less than the full buffer is
    /// reported as [`DownloadError::ShortWrite`].
    pub fn write_at(&self, offset: u64, buf: &[u8]) -> Result<(), DownloadError> {
        if buf.is_empty() {
            return Ok(());
        }
        let written = positional_write(&self.file, buf, offset)
            .map_err(|err| DownloadError::io(&self.path, err))?;
        check_written(offset, buf.len(), written)
    }
}

fn check_written(offset: u64, expected: usize, written: usize) -> Result<(), DownloadError> {
    if written != expected {
        return Err(DownloadError::ShortWrite {
            offset,
            expected,
            written,
        });
    }
    Ok(())
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|err| DownloadError::io(parent, err))?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.write_at(buf, offset)
}

#[cfg(windows)]
fn positional_write(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_write(buf, offset)
}
