//! Relay orchestrator.
//!
//! Sequences one run through download, resolution and upload, owns the
//! run's staging file, and produces exactly one terminal notification.

use std::sync::Arc;

use filerelay_destinations::{DestinationResolver, UploadClient, UploadOutcome};
use filerelay_transfer::{StagingHandle, StagingStore};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::chat::{ChatPlatform, InboundMessage, StatusMessage};
use crate::error::RelayError;
use crate::reporter::{ProgressReporter, notify_bounded};
use crate::sink::SinkWriter;
use crate::source::SourceReader;
use crate::text;
use crate::types::{RelayConfig, RelayEvent, RelayState, TransferRequest, TransferResult};

/// Runs relay transfers.
///
/// Runs are independent: each has its own throttle, staging file and
/// child cancellation token. The orchestrator itself is shared read-only
/// between concurrent runs.
pub struct RelayOrchestrator {
    chat: Arc<dyn ChatPlatform>,
    resolver: DestinationResolver,
    uploader: UploadClient,
    staging: StagingStore,
    config: RelayConfig,
    events_tx: mpsc::Sender<RelayEvent>,
    events_rx: Option<mpsc::Receiver<RelayEvent>>,
    cancel: CancellationToken,
}

impl RelayOrchestrator {
    /// Creates an orchestrator.
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        resolver: DestinationResolver,
        uploader: UploadClient,
        config: RelayConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        Self {
            chat,
            resolver,
            uploader,
            staging: StagingStore::new(config.staging_dir.clone()),
            config,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<RelayEvent>> {
        self.events_rx.take()
    }

    /// Root cancellation token. Cancelling it cancels every run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Relays the media of `message`.
    ///
    /// Returns `None` without side effects when the message has no media.
    pub async fn relay(&self, message: &InboundMessage) -> Option<TransferResult> {
        self.relay_with_cancel(message, self.cancel.child_token())
            .await
    }

    /// Like [`relay`](Self::relay), with a caller-provided cancellation
    /// token for this run.
    pub async fn relay_with_cancel(
        &self,
        message: &InboundMessage,
        cancel: CancellationToken,
    ) -> Option<TransferResult> {
        let Some(request) = TransferRequest::from_message(message) else {
            debug!(chat = message.chat_id, message = message.message_id, "no media, ignoring");
            return None;
        };
        Some(self.run(request, cancel).await)
    }

    async fn run(&self, request: TransferRequest, cancel: CancellationToken) -> TransferResult {
        let run_id = request.run_id.clone();
        info!(
            run = %run_id,
            file = %request.display_name,
            declared = ?request.declared_size(),
            "relay started"
        );

        let status = match self
            .chat
            .create_status_message(request.chat_id, request.message_id, text::STARTING)
            .await
        {
            Ok(status) => Some(status),
            Err(e) => {
                warn!(run = %run_id, error = %e, "could not post status message");
                None
            }
        };

        let (mut reporter, notifier) = ProgressReporter::spawn(
            &run_id,
            self.chat.clone(),
            status.clone(),
            self.config.throttle_window,
            self.config.progress_send_wait,
            self.config.notify_timeout,
        );

        let mut state = RelayState::Idle;
        self.transition(&run_id, &mut state, RelayState::Downloading);

        let outcome = match self
            .staging
            .create(&request.display_name, request.declared_size())
            .await
        {
            Ok(mut handle) => {
                let outcome = self
                    .pipeline(&request, &mut handle, &mut reporter, &cancel, &mut state)
                    .await;
                let next = if outcome.is_ok() {
                    RelayState::Finalizing
                } else {
                    RelayState::Failed
                };
                self.transition(&run_id, &mut state, next);
                handle.release().await;
                outcome
            }
            Err(e) => {
                self.transition(&run_id, &mut state, RelayState::Failed);
                Err(RelayError::from(e))
            }
        };
        self.transition(&run_id, &mut state, RelayState::Done);

        // Queued progress precedes the terminal message.
        reporter.close();
        notifier.drain().await;

        let (result, message) = match outcome {
            Ok(upload) => {
                info!(run = %run_id, link = %upload.link, derived = upload.derived, "relay completed");
                (
                    TransferResult::Success {
                        destination_link: upload.link.clone(),
                        display_name: request.display_name.clone(),
                    },
                    text::success(&request.display_name, &upload.link),
                )
            }
            Err(e) => {
                error!(run = %run_id, kind = %e.kind(), error = %e, "relay failed");
                let message = text::failure(&e);
                (
                    TransferResult::Failure {
                        error_kind: e.kind(),
                        detail: e.to_string(),
                    },
                    message,
                )
            }
        };

        self.send_terminal(&run_id, &request, status.as_ref(), &message)
            .await;
        self.emit(RelayEvent::Finished {
            run_id,
            result: result.clone(),
        });
        result
    }

    async fn pipeline(
        &self,
        request: &TransferRequest,
        staging: &mut StagingHandle,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
        state: &mut RelayState,
    ) -> Result<UploadOutcome, RelayError> {
        let run_id = &request.run_id;

        let mut writer = staging.writer().await?;
        let downloaded = SourceReader::new(self.chat.as_ref(), self.config.chunk_size)
            .pull(request, &mut writer, reporter, cancel)
            .await?;
        writer.finish().await?;
        info!(run = %run_id, bytes = downloaded, "download complete");

        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        self.transition(run_id, state, RelayState::Resolving);
        reporter.announce(text::RESOLVING).await;
        let destination = self.resolver.resolve(&self.config.profile).await;

        if cancel.is_cancelled() {
            return Err(RelayError::Cancelled);
        }
        self.transition(run_id, state, RelayState::Uploading);
        reporter.announce(text::uploading(&destination)).await;

        let reader = staging.reader().await?;
        SinkWriter::new(&self.uploader, self.config.chunk_size)
            .push(&destination, reader, &request.display_name, reporter, cancel)
            .await
    }

    /// Sends the single terminal message of a run.
    async fn send_terminal(
        &self,
        run_id: &str,
        request: &TransferRequest,
        status: Option<&StatusMessage>,
        message: &str,
    ) {
        match status {
            Some(status) => {
                notify_bounded(
                    self.chat.as_ref(),
                    status,
                    message,
                    self.config.notify_timeout,
                    run_id,
                )
                .await;
            }
            None => {
                let posted = tokio::time::timeout(
                    self.config.notify_timeout,
                    self.chat
                        .create_status_message(request.chat_id, request.message_id, message),
                )
                .await;
                if !matches!(posted, Ok(Ok(_))) {
                    warn!(run = %run_id, "terminal message not delivered");
                }
            }
        }
    }

    fn transition(&self, run_id: &str, state: &mut RelayState, next: RelayState) {
        debug_assert!(
            state.can_transition_to(next),
            "invalid transition {state} -> {next}"
        );
        debug!(run = %run_id, from = %state, to = %next, "state");
        *state = next;
        self.emit(RelayEvent::State {
            run_id: run_id.to_string(),
            state: next,
        });
    }

    fn emit(&self, event: RelayEvent) {
        // Dropped when full or unobserved.
        let _ = self.events_tx.try_send(event);
    }
}
