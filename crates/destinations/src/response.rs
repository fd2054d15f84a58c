//! Per-family parsing of upload completion responses.

use serde_json::Value;

use crate::types::{Destination, DestinationFamily, Endpoints, encode_name};

/// Why a completion body did not yield a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The body is not the expected shape (not JSON, missing fields).
    Malformed(String),
    /// The body carries an explicit application-level error.
    Rejected(String),
}

/// Extracts the download link from a destination's completion body.
pub trait UploadResponseParser: Send + Sync {
    /// Whether `status` counts as a completed upload.
    fn accepts(&self, status: u16) -> bool {
        (200..300).contains(&status)
    }

    /// Parses a body returned with a success status.
    fn parse(&self, body: &[u8]) -> Result<String, ParseFailure>;

    /// Link derivable from request parameters alone, used when the body
    /// is malformed but the status indicated success.
    fn derived_link(&self, _file_name: &str) -> Option<String> {
        None
    }
}

/// Returns the parser matching the destination's family.
pub fn parser_for(
    destination: &Destination,
    endpoints: &Endpoints,
) -> Box<dyn UploadResponseParser> {
    match destination.family {
        DestinationFamily::Gofile => Box::new(GofileResponse),
        DestinationFamily::Buzzheavier => Box::new(BuzzheavierResponse {
            link_base: endpoints.buzzheavier_link_base.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Gofile
// ---------------------------------------------------------------------------

/// `{"status":"ok","data":{"downloadPage":"..."}}`
pub struct GofileResponse;

impl UploadResponseParser for GofileResponse {
    fn parse(&self, body: &[u8]) -> Result<String, ParseFailure> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ParseFailure::Malformed(format!("invalid JSON: {e}")))?;

        let status = value
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ParseFailure::Rejected("missing status".into()))?;

        if status != "ok" {
            let detail = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or(status)
                .to_string();
            return Err(ParseFailure::Rejected(detail));
        }

        value
            .pointer("/data/downloadPage")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ParseFailure::Rejected("missing data.downloadPage".into()))
    }
}

// ---------------------------------------------------------------------------
// Buzzheavier
// ---------------------------------------------------------------------------

/// `{"url":"..."}`, or any body when the link is derived from the name.
pub struct BuzzheavierResponse {
    link_base: String,
}

impl UploadResponseParser for BuzzheavierResponse {
    fn accepts(&self, status: u16) -> bool {
        matches!(status, 200 | 201)
    }

    fn parse(&self, body: &[u8]) -> Result<String, ParseFailure> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ParseFailure::Malformed(format!("invalid JSON: {e}")))?;

        if let Some(url) = value.get("url").and_then(Value::as_str) {
            return Ok(url.to_string());
        }
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ParseFailure::Rejected(error.to_string()));
        }
        Err(ParseFailure::Malformed("no url field".into()))
    }

    fn derived_link(&self, file_name: &str) -> Option<String> {
        Some(format!(
            "{}/{}",
            self.link_base.trim_end_matches('/'),
            encode_name(file_name)
        ))
    }
}
