//! Telegram Bot API client.
//!
//! Async HTTP client using `reqwest`. Every method is a JSON `POST` to
//! `{base}/bot{token}/{method}`; files are fetched from
//! `{base}/file/bot{token}/{path}`.

use std::io;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use filerelay_relay::DownloadStream;

use crate::types::{
    ApiResponse, EditMessageText, File, GetFile, GetUpdates, LinkPreviewOptions, Message,
    ReplyParameters, SendMessage, Update, User,
};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";

/// Deadline of ordinary API calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from the Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response without result")]
    MissingResult,

    #[error("file {0} cannot be downloaded")]
    NoFilePath(String),

    #[error("invalid bot token")]
    InvalidToken,
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        // Request URLs contain the bot token.
        TelegramError::Http(e.without_url())
    }
}

impl TelegramError {
    /// Returns `true` for the benign error of an edit that changes nothing.
    pub fn is_not_modified(&self) -> bool {
        matches!(self, TelegramError::Api { code: 400, description } if description.contains("message is not modified"))
    }
}

/// Telegram Bot API client.
#[derive(Debug, Clone)]
pub struct BotClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BotClient {
    /// Creates a client for the bot identified by `token`.
    pub fn new(token: &str) -> Result<Self, TelegramError> {
        let token = token.trim();
        if token.is_empty() || token.contains(['/', ' ', '?', '#']) {
            return Err(TelegramError::InvalidToken);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.to_string(),
        })
    }

    /// Sets a custom API base URL (local Bot API server, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Duration) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);
        let resp = self
            .http
            .post(&url)
            .json(params)
            .timeout(timeout)
            .send()
            .await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        let parsed: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(TelegramError::Api {
                    code: status.as_u16(),
                    description: String::from_utf8_lossy(&body).chars().take(100).collect(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if !parsed.ok {
            return Err(TelegramError::Api {
                code: parsed.error_code.unwrap_or(status.as_u16()),
                description: parsed.description.unwrap_or_default(),
            });
        }
        parsed.result.ok_or(TelegramError::MissingResult)
    }

    /// Returns the bot's own account. Used to validate the token.
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &serde_json::json!({}), CALL_TIMEOUT).await
    }

    /// Long-polls for message updates after `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>, TelegramError> {
        let params = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: &["message"],
        };
        let deadline = Duration::from_secs(timeout_secs) + CALL_TIMEOUT;
        self.call("getUpdates", &params, deadline).await
    }

    /// Resolves a file id to its download path.
    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &GetFile { file_id }, CALL_TIMEOUT).await
    }

    /// Opens a streaming download of a file returned by [`get_file`](Self::get_file).
    pub async fn download(&self, file: &File) -> Result<DownloadStream, TelegramError> {
        let path = file
            .file_path
            .as_deref()
            .ok_or_else(|| TelegramError::NoFilePath(file.file_id.clone()))?;
        let url = format!("{}/file/bot{}/{}", self.base_url, self.token, path);
        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                code: status.as_u16(),
                description: body.chars().take(100).collect(),
            });
        }

        let content_length = resp.content_length().or(file.file_size);
        debug!(file = %file.file_id, ?content_length, "download started");
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| io::Error::other(e.without_url())));
        Ok(DownloadStream {
            content_length,
            body: Box::pin(body),
        })
    }

    /// Sends a text message, optionally as a reply.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i64>,
    ) -> Result<Message, TelegramError> {
        let params = SendMessage {
            chat_id,
            text,
            reply_parameters: reply_to.map(|message_id| ReplyParameters {
                message_id,
                allow_sending_without_reply: true,
            }),
            link_preview_options: LinkPreviewOptions { is_disabled: true },
        };
        self.call("sendMessage", &params, CALL_TIMEOUT).await
    }

    /// Replaces the text of a message sent by the bot.
    ///
    /// An edit that would not change the text succeeds.
    pub async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<(), TelegramError> {
        let params = EditMessageText {
            chat_id,
            message_id,
            text,
            link_preview_options: LinkPreviewOptions { is_disabled: true },
        };
        match self
            .call::<_, serde_json::Value>("editMessageText", &params, CALL_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_modified() => Ok(()),
            Err(e) => Err(e),
        }
    }
}
