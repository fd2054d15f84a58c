use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter, ReadBuf};
use tracing::{debug, warn};

use crate::TransferError;
use crate::validation::sanitize_file_name;

/// Write buffer in front of the staging file.
const WRITE_BUFFER_SIZE: usize = 256 * 1024;

// ---------------------------------------------------------------------------
// StagingStore
// ---------------------------------------------------------------------------

/// Allocates transient staging files under a root directory.
#[derive(Debug, Clone)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of all staging files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocates a uniquely named, empty staging file for one transfer.
    ///
    /// Fails with [`TransferError::Allocation`] when the directory or file
    /// cannot be created (permission denied, disk full, ...).
    pub async fn create(
        &self,
        display_name: &str,
        declared_total: Option<u64>,
    ) -> Result<StagingHandle, TransferError> {
        let allocation = |path: &Path, source: io::Error| TransferError::Allocation {
            path: path.display().to_string(),
            source,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| allocation(&self.root, e))?;

        let name = format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(display_name)
        );
        let path = self.root.join(name);

        File::options()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| allocation(&path, e))?;

        debug!(path = %path.display(), "staging file allocated");

        Ok(StagingHandle {
            path,
            bytes_written: 0,
            declared_total: declared_total.filter(|t| *t > 0),
            released: false,
        })
    }
}

// ---------------------------------------------------------------------------
// StagingHandle
// ---------------------------------------------------------------------------

/// Transient local storage bound to exactly one transfer.
///
/// The owner must call [`release`](Self::release) on every exit path.
/// Dropping an unreleased handle deletes the file as a last resort and
/// logs a warning.
#[derive(Debug)]
pub struct StagingHandle {
    path: PathBuf,
    bytes_written: u64,
    declared_total: Option<u64>,
    released: bool,
}

impl StagingHandle {
    /// Local path of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes appended through [`writer`](Self::writer) so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Total size declared by the origin, if known.
    pub fn declared_total(&self) -> Option<u64> {
        self.declared_total
    }

    /// Records a total learned after allocation (e.g. from response headers).
    pub fn set_declared_total(&mut self, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            self.declared_total = Some(total);
        }
    }

    /// Returns `true` once [`release`](Self::release) has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Opens an append-only writer.
    pub async fn writer(&mut self) -> Result<StagingWriter<'_>, TransferError> {
        if self.released {
            return Err(TransferError::Released);
        }
        let file = File::options().append(true).open(&self.path).await?;
        Ok(StagingWriter {
            file: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            handle: self,
        })
    }

    /// Opens a sequential reader over the staged bytes.
    pub async fn reader(&self) -> Result<StagingReader, TransferError> {
        if self.released {
            return Err(TransferError::Released);
        }
        let file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();
        Ok(StagingReader { file, len })
    }

    /// Deletes the staging file.
    ///
    /// Idempotent: later calls, or a file that is already gone, are no-ops.
    /// Returns `true` only for the call that performed the release.
    pub async fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;

        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path.display(), "staging file released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "staging file already gone");
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to delete staging file");
            }
        }
        true
    }
}

impl Drop for StagingHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(path = %self.path.display(), "staging handle dropped without release");
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to delete staging file");
        }
    }
}

// ---------------------------------------------------------------------------
// StagingWriter / StagingReader
// ---------------------------------------------------------------------------

/// Append-only sink into a staging file.
pub struct StagingWriter<'a> {
    file: BufWriter<File>,
    handle: &'a mut StagingHandle,
}

impl StagingWriter<'_> {
    /// Appends one chunk.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), TransferError> {
        self.file.write_all(chunk).await?;
        self.handle.bytes_written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes written to the handle so far.
    pub fn bytes_written(&self) -> u64 {
        self.handle.bytes_written
    }

    /// Flushes buffered data to disk and returns the total bytes written.
    pub async fn finish(mut self) -> Result<u64, TransferError> {
        self.file.flush().await?;
        self.file.get_ref().sync_all().await?;
        Ok(self.handle.bytes_written)
    }
}

/// Sequential reader over a staging file.
pub struct StagingReader {
    file: File,
    len: u64,
}

impl StagingReader {
    /// Length of the staged file when the reader was opened.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns `true` if nothing was staged.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsyncRead for StagingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}
