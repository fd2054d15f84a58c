//! Relay error types.

use filerelay_destinations::DestinationError;
use filerelay_transfer::TransferError;

/// Caller-visible classification of a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceTransportFault,
    StorageFault,
    DestinationTransportFault,
    DestinationRejected,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::SourceTransportFault => "source transport fault",
            ErrorKind::StorageFault => "storage fault",
            ErrorKind::DestinationTransportFault => "destination transport fault",
            ErrorKind::DestinationRejected => "destination rejected",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Errors that terminate a relay run.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("download failed: {0}")]
    SourceTransport(String),

    #[error("local storage error: {0}")]
    Storage(#[from] TransferError),

    #[error("destination unreachable: {0}")]
    DestinationTransport(String),

    #[error("destination rejected the upload: {0}")]
    DestinationRejected(String),

    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    /// Maps the error to its caller-visible kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::SourceTransport(_) => ErrorKind::SourceTransportFault,
            RelayError::Storage(_) => ErrorKind::StorageFault,
            RelayError::DestinationTransport(_) => ErrorKind::DestinationTransportFault,
            RelayError::DestinationRejected(_) => ErrorKind::DestinationRejected,
            RelayError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

impl From<DestinationError> for RelayError {
    fn from(e: DestinationError) -> Self {
        if e.is_transport() {
            RelayError::DestinationTransport(e.to_string())
        } else {
            RelayError::DestinationRejected(e.to_string())
        }
    }
}

/// Failure of the feedback channel. Always absorbed, never ends a run.
#[derive(Debug, thiserror::Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);
