//! Transfer relay pipeline.
//!
//! This crate implements the **business logic** of relaying one file from a
//! chat platform to an upload destination. It has no chat transport of its
//! own: the bot provides a [`ChatPlatform`] implementation.
//!
//! # Pipeline
//!
//! 1. **Download**: stream the file from the chat platform into staging
//! 2. **Resolve**: pick the destination (discovery with fallback)
//! 3. **Upload**: stream the staged file to the destination
//! 4. **Finalize**: release staging, send the single terminal message
//!
//! Progress from both streaming phases goes through one throttled
//! reporter per run.

pub mod chat;
pub mod error;
pub mod orchestrator;
pub mod reporter;
pub mod sink;
pub mod source;
pub mod text;
pub mod types;

// Re-export primary types for convenience.
pub use chat::{ByteStream, ChatFuture, ChatPlatform, DownloadStream, FileRef, InboundMessage, StatusMessage};
pub use error::{ErrorKind, NotifyError, RelayError};
pub use orchestrator::RelayOrchestrator;
pub use reporter::{Notifier, ProgressReporter};
pub use sink::SinkWriter;
pub use source::SourceReader;
pub use types::{RelayConfig, RelayEvent, RelayState, TransferRequest, TransferResult};
