//! Sink Writer: staging → destination.

use std::io;

use bytes::Bytes;
use filerelay_destinations::{Destination, UploadClient, UploadOutcome};
use filerelay_transfer::{ChunkReader, Phase, StagingReader, TransferError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RelayError;
use crate::reporter::ProgressReporter;

/// Pushes a staged file to a resolved destination.
///
/// The request body is fed from the staging file one chunk at a time
/// through a single-slot channel, so a chunk is reported as sent only
/// once the HTTP client has taken it for transmission.
pub struct SinkWriter<'a> {
    uploader: &'a UploadClient,
    chunk_size: usize,
}

impl<'a> SinkWriter<'a> {
    pub fn new(uploader: &'a UploadClient, chunk_size: usize) -> Self {
        Self {
            uploader,
            chunk_size,
        }
    }

    /// Uploads `reader` as `file_name` and returns the destination's link.
    pub async fn push(
        &self,
        destination: &Destination,
        reader: StagingReader,
        file_name: &str,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<UploadOutcome, RelayError> {
        let total = reader.len();
        let (body_tx, body_rx) = mpsc::channel::<Bytes>(1);
        let stream = futures_util::stream::unfold(body_rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (Ok::<_, io::Error>(chunk), rx))
        });

        let upload = self
            .uploader
            .upload(destination, file_name, total, reqwest::Body::wrap_stream(stream));
        let feed = feed_body(reader, self.chunk_size, body_tx, reporter, cancel);
        tokio::pin!(upload);
        tokio::pin!(feed);

        let mut fed = false;
        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                // Dropping the upload future aborts a request still waiting
                // for the destination's answer.
                _ = cancel.cancelled() => return Err(RelayError::Cancelled),
                outcome = &mut feed, if !fed => {
                    // Dropping the upload future aborts the request.
                    outcome?;
                    fed = true;
                }
            }
        };
        if !fed {
            debug!(destination = %destination, "destination answered before the body was fully sent");
        }
        Ok(result?)
    }
}

async fn feed_body(
    reader: StagingReader,
    chunk_size: usize,
    tx: mpsc::Sender<Bytes>,
    reporter: &mut ProgressReporter,
    cancel: &CancellationToken,
) -> Result<(), RelayError> {
    let total = reader.len();
    let mut chunks = ChunkReader::new(reader, chunk_size);
    let mut sent = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        let chunk = chunks
            .next_chunk()
            .await
            .map_err(|e| RelayError::Storage(TransferError::Io(e)))?;
        let Some(chunk) = chunk else {
            break;
        };
        let len = chunk.len() as u64;
        let sent_ok = tokio::select! {
            _ = cancel.cancelled() => return Err(RelayError::Cancelled),
            sent_ok = tx.send(chunk) => sent_ok.is_ok(),
        };
        if !sent_ok {
            // The request ended; its outcome decides the result.
            return std::future::pending().await;
        }
        sent += len;
        reporter.report(Phase::Uploading, sent, Some(total)).await;
    }

    reporter.finish(Phase::Uploading, sent, Some(total)).await;
    // Ends the request body.
    drop(tx);
    Ok(())
}
