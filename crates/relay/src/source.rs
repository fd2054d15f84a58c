//! Source Reader: origin platform → staging.

use filerelay_transfer::{ChunkReader, Phase, StagingWriter};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::chat::ChatPlatform;
use crate::error::RelayError;
use crate::reporter::ProgressReporter;
use crate::types::TransferRequest;

/// Pulls a file from the chat platform into a staging writer.
pub struct SourceReader<'a> {
    chat: &'a dyn ChatPlatform,
    chunk_size: usize,
}

impl<'a> SourceReader<'a> {
    pub fn new(chat: &'a dyn ChatPlatform, chunk_size: usize) -> Self {
        Self { chat, chunk_size }
    }

    /// Streams the file of `request` into `writer` chunk by chunk,
    /// reporting cumulative bytes after each chunk.
    ///
    /// The total comes from the response's `Content-Length`, else from the
    /// size declared with the message, else it is unknown. Cancellation is
    /// checked between chunks. Returns the number of bytes staged.
    pub async fn pull(
        &self,
        request: &TransferRequest,
        writer: &mut StagingWriter<'_>,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<u64, RelayError> {
        let download = self.chat.open_download(&request.file).await?;
        let total = download
            .content_length
            .filter(|len| *len > 0)
            .or(request.declared_size());
        debug!(run = %request.run_id, total = ?total, "download opened");

        let mut chunks = ChunkReader::new(StreamReader::new(download.body), self.chunk_size);
        let mut transferred = 0u64;

        loop {
            if cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }
            let chunk = chunks
                .next_chunk()
                .await
                .map_err(|e| RelayError::SourceTransport(e.to_string()))?;
            let Some(chunk) = chunk else {
                break;
            };
            writer.write_chunk(&chunk).await?;
            transferred += chunk.len() as u64;
            reporter.report(Phase::Downloading, transferred, total).await;
        }

        if let Some(total) = total
            && total != transferred
        {
            warn!(run = %request.run_id, total, transferred, "download size differs from declared size");
        }
        reporter.finish(Phase::Downloading, transferred, total).await;
        Ok(transferred)
    }
}
