//! Streaming upload client.
//!
//! Async HTTP client using `reqwest`. The request body is supplied by the
//! caller as a stream so the payload is never buffered whole in memory.

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, StatusCode};
use tracing::{debug, warn};

use crate::error::DestinationError;
use crate::response::{ParseFailure, parser_for};
use crate::types::{Destination, DestinationFamily, Endpoints, UploadOutcome};

/// Longest body excerpt kept in error details.
const DETAIL_LIMIT: usize = 100;

/// Uploads staged payloads to a resolved destination.
#[derive(Debug, Clone)]
pub struct UploadClient {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
}

impl UploadClient {
    /// Creates a client. `http` should not carry a total request timeout,
    /// since uploads of large files legitimately take a long time.
    pub fn new(http: reqwest::Client, endpoints: Arc<Endpoints>) -> Self {
        Self { http, endpoints }
    }

    /// Endpoint configuration.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Streams `length` bytes from `body` to `destination` as `file_name`.
    ///
    /// - Gofile: multipart `POST`, file part `file`, credential as the
    ///   `token` form field.
    /// - Buzzheavier: raw-body `PUT` to the name-derived URL, credential as
    ///   a bearer token.
    ///
    /// Connection failures and 5xx statuses are transport errors; 4xx
    /// statuses and explicit error bodies are rejections.
    pub async fn upload(
        &self,
        destination: &Destination,
        file_name: &str,
        length: u64,
        body: Body,
    ) -> Result<UploadOutcome, DestinationError> {
        let url = destination.upload_url(&self.endpoints, file_name);
        debug!(%url, length, "starting upload");

        let request = match destination.family {
            DestinationFamily::Gofile => {
                let part = Part::stream_with_length(body, length)
                    .file_name(file_name.to_string())
                    .mime_str("application/octet-stream")?;
                let mut form = Form::new();
                if let Some(token) = &destination.credential {
                    form = form.text("token", token.clone());
                }
                self.http.post(&url).multipart(form.part("file", part))
            }
            DestinationFamily::Buzzheavier => {
                let mut request = self
                    .http
                    .put(&url)
                    .header(CONTENT_LENGTH, length)
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(body);
                if let Some(token) = &destination.credential {
                    let value = HeaderValue::from_str(&format!("Bearer {token}"))
                        .map_err(|_| DestinationError::InvalidCredential)?;
                    request = request.header(AUTHORIZATION, value);
                }
                request
            }
        };

        let resp = request.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        self.interpret(destination, file_name, status, &bytes)
    }

    fn interpret(
        &self,
        destination: &Destination,
        file_name: &str,
        status: StatusCode,
        body: &[u8],
    ) -> Result<UploadOutcome, DestinationError> {
        if status.is_server_error() {
            return Err(DestinationError::Unavailable {
                status: status.as_u16(),
                detail: excerpt(body),
            });
        }
        let parser = parser_for(destination, &self.endpoints);
        if !parser.accepts(status.as_u16()) {
            return Err(DestinationError::Rejected {
                status: status.as_u16(),
                detail: excerpt(body),
            });
        }

        match parser.parse(body) {
            Ok(link) => Ok(UploadOutcome {
                link,
                derived: false,
            }),
            Err(ParseFailure::Rejected(detail)) => Err(DestinationError::Rejected {
                status: status.as_u16(),
                detail,
            }),
            Err(ParseFailure::Malformed(reason)) => match parser.derived_link(file_name) {
                Some(link) => {
                    warn!(%reason, %link, "unparsable upload response, deriving link");
                    Ok(UploadOutcome {
                        link,
                        derived: true,
                    })
                }
                None => Err(DestinationError::Rejected {
                    status: status.as_u16(),
                    detail: format!("unparsable response: {reason}"),
                }),
            },
        }
    }
}

/// First [`DETAIL_LIMIT`] characters of a response body.
fn excerpt(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(DETAIL_LIMIT)
        .collect()
}
