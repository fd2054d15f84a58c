//! Destination error types.

/// Errors produced while talking to a destination.
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a 5xx status.
    #[error("destination unavailable ({status}): {detail}")]
    Unavailable { status: u16, detail: String },

    /// The server was reachable but refused the upload.
    #[error("destination rejected upload ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("server discovery failed: {0}")]
    Discovery(String),

    #[error("invalid credential")]
    InvalidCredential,
}

impl DestinationError {
    /// Returns `true` for connection-level failures (timeout, DNS, refused,
    /// 5xx), as opposed to application-level rejections.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DestinationError::Http(_)
                | DestinationError::Unavailable { .. }
                | DestinationError::Discovery(_)
        )
    }
}
