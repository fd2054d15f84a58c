use std::path::PathBuf;
use std::time::Duration;

use filerelay_destinations::{DestinationFamily, DestinationProfile};
use filerelay_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_THROTTLE_WINDOW, sanitize_file_name};

use crate::chat::{FileRef, InboundMessage};
use crate::error::ErrorKind;

/// Relay settings shared by every run.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Fixed read size of both streaming phases.
    pub chunk_size: usize,
    /// Minimum interval between two progress reports of a run.
    pub throttle_window: Duration,
    /// Directory holding staging files.
    pub staging_dir: PathBuf,
    /// Destination every run uploads to.
    pub profile: DestinationProfile,
    /// Upper bound for one status-message edit.
    pub notify_timeout: Duration,
    /// Longest the data path waits to queue a progress report.
    pub progress_send_wait: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            throttle_window: DEFAULT_THROTTLE_WINDOW,
            staging_dir: std::env::temp_dir().join("filerelay"),
            profile: DestinationProfile {
                family: DestinationFamily::Gofile,
                credential: None,
            },
            notify_timeout: Duration::from_secs(10),
            progress_send_wait: Duration::from_millis(50),
        }
    }
}

/// One inbound payload handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub run_id: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub file: FileRef,
    /// Sanitised name used for staging and upload.
    pub display_name: String,
}

impl TransferRequest {
    /// Builds a request for the media of `message`, if it has any.
    pub fn from_message(message: &InboundMessage) -> Option<Self> {
        let file = message.file.clone()?;
        Some(Self {
            run_id: uuid::Uuid::new_v4().simple().to_string()[..12].to_string(),
            chat_id: message.chat_id,
            message_id: message.message_id,
            display_name: sanitize_file_name(&file.declared_name),
            file,
        })
    }

    /// Size announced with the message, `None` when unknown.
    pub fn declared_size(&self) -> Option<u64> {
        self.file.declared_size.filter(|s| *s > 0)
    }
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferResult {
    Success {
        destination_link: String,
        display_name: String,
    },
    Failure {
        error_kind: ErrorKind,
        detail: String,
    },
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }

    /// Error kind of a failed run.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            TransferResult::Success { .. } => None,
            TransferResult::Failure { error_kind, .. } => Some(*error_kind),
        }
    }
}

/// Orchestrator state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Downloading,
    Resolving,
    Uploading,
    Finalizing,
    Failed,
    Done,
}

impl RelayState {
    /// Returns `true` if the state machine allows `self -> next`.
    pub fn can_transition_to(self, next: RelayState) -> bool {
        use RelayState::*;
        matches!(
            (self, next),
            (Idle, Downloading)
                | (Downloading, Resolving)
                | (Resolving, Uploading)
                | (Uploading, Finalizing)
                | (Finalizing, Done)
                | (Failed, Done)
        ) || (next == Failed && !matches!(self, Idle | Failed | Done))
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RelayState::Idle => "idle",
            RelayState::Downloading => "downloading",
            RelayState::Resolving => "resolving",
            RelayState::Uploading => "uploading",
            RelayState::Finalizing => "finalizing",
            RelayState::Failed => "failed",
            RelayState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Events emitted by the orchestrator.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    State { run_id: String, state: RelayState },
    Finished { run_id: String, result: TransferResult },
}
