//! Chat platform collaborator.
//!
//! The relay core never talks to a chat API directly. Everything it needs
//! from the origin platform goes through [`ChatPlatform`], which the bot
//! implements on top of its API client and tests implement with mocks.

use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::Stream;

use crate::error::{NotifyError, RelayError};

/// Boxed future returned by [`ChatPlatform`] methods.
pub type ChatFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Byte stream of a file being downloaded from the platform.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Handle to a file attached to an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Opaque platform file id.
    pub id: String,
    pub declared_name: String,
    /// Size announced with the message, if any.
    pub declared_size: Option<u64>,
}

/// An inbound message as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i64,
    /// `None` when the message carries no media.
    pub file: Option<FileRef>,
}

/// A message the relay edits to show progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub chat_id: i64,
    pub message_id: i64,
}

/// An opened download.
pub struct DownloadStream {
    /// `Content-Length` of the response, when present.
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl std::fmt::Debug for DownloadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadStream")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Operations the relay needs from the origin chat platform.
pub trait ChatPlatform: Send + Sync {
    /// Opens a streaming download of `file`.
    ///
    /// Failures must be [`RelayError::SourceTransport`].
    fn open_download<'a>(&'a self, file: &'a FileRef) -> ChatFuture<'a, DownloadStream, RelayError>;

    /// Posts the status message of a run, replying to `reply_to`.
    fn create_status_message<'a>(
        &'a self,
        chat_id: i64,
        reply_to: i64,
        text: &'a str,
    ) -> ChatFuture<'a, StatusMessage, NotifyError>;

    /// Replaces the text of a status message.
    fn notify<'a>(&'a self, status: &'a StatusMessage, text: &'a str) -> ChatFuture<'a, (), NotifyError>;
}
