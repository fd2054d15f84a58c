//! Test doubles for relay pipeline tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use filerelay_destinations::{
    DestinationFamily, DestinationProfile, DestinationResolver, Endpoints, UploadClient,
};
use filerelay_relay::{
    ChatFuture, ChatPlatform, DownloadStream, FileRef, InboundMessage, NotifyError,
    RelayConfig, RelayError, RelayOrchestrator, StatusMessage,
};

// ---------------------------------------------------------------------------
// Chat platform mock
// ---------------------------------------------------------------------------

/// Scripted chat platform recording every message it is asked to show.
pub struct MockChat {
    payload: Vec<u8>,
    piece: usize,
    content_length: Option<u64>,
    fail_after: Option<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    pub created: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<String>>,
}

impl MockChat {
    /// Serves `payload` in pieces of `piece` bytes with a matching
    /// `Content-Length`.
    pub fn new(payload: Vec<u8>, piece: usize) -> Self {
        Self {
            content_length: Some(payload.len() as u64),
            payload,
            piece: piece.max(1),
            fail_after: None,
            cancel_after: None,
            created: Mutex::new(Vec::new()),
            notes: Mutex::new(Vec::new()),
        }
    }

    pub fn without_content_length(mut self) -> Self {
        self.content_length = None;
        self
    }

    /// Fails the stream after `pieces` pieces.
    pub fn failing_after(mut self, pieces: usize) -> Self {
        self.fail_after = Some(pieces);
        self
    }

    /// Cancels `token` once `pieces` pieces were handed out.
    pub fn cancelling_after(mut self, pieces: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((pieces, token));
        self
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().unwrap().clone()
    }

    /// Notifications that end a run.
    pub fn terminal_notes(&self) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter(|n| n.starts_with('✅') || n.starts_with('❌') || n.starts_with('⛔'))
            .collect()
    }

    /// Progress texts of the download phase.
    pub fn download_progress(&self) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter(|n| n.starts_with("📥 Downloading from Telegram:\n"))
            .collect()
    }

    /// Progress texts of the upload phase.
    pub fn upload_progress(&self) -> Vec<String> {
        self.notes()
            .into_iter()
            .filter(|n| n.starts_with("📤 Uploading to destination:\n"))
            .collect()
    }
}

impl ChatPlatform for MockChat {
    fn open_download<'a>(&'a self, _file: &'a FileRef) -> ChatFuture<'a, DownloadStream, RelayError> {
        Box::pin(async move {
            let mut items: Vec<io::Result<Bytes>> = self
                .payload
                .chunks(self.piece)
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect();
            if let Some(n) = self.fail_after {
                items.truncate(n);
                items.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")));
            }
            let cancel = self.cancel_after.clone();
            let body = futures_util::stream::iter(items.into_iter().enumerate()).map(
                move |(i, item)| {
                    if let Some((n, token)) = &cancel
                        && i + 1 == *n
                    {
                        token.cancel();
                    }
                    item
                },
            );
            Ok(DownloadStream {
                content_length: self.content_length,
                body: Box::pin(body),
            })
        })
    }

    fn create_status_message<'a>(
        &'a self,
        chat_id: i64,
        _reply_to: i64,
        text: &'a str,
    ) -> ChatFuture<'a, StatusMessage, NotifyError> {
        Box::pin(async move {
            self.created.lock().unwrap().push(text.to_string());
            Ok(StatusMessage {
                chat_id,
                message_id: 1000,
            })
        })
    }

    fn notify<'a>(&'a self, _status: &'a StatusMessage, text: &'a str) -> ChatFuture<'a, (), NotifyError> {
        Box::pin(async move {
            self.notes.lock().unwrap().push(text.to_string());
            Ok(())
        })
    }
}

pub fn message_with_file(name: &str, size: Option<u64>) -> InboundMessage {
    InboundMessage {
        chat_id: 42,
        message_id: 7,
        file: Some(FileRef {
            id: "file-1".into(),
            declared_name: name.into(),
            declared_size: size,
        }),
    }
}

/// Deterministic, non-repeating test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

// ---------------------------------------------------------------------------
// Destination double
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DoubleState {
    base: String,
    discovery_body: String,
    stored: HashMap<String, Vec<u8>>,
    uploads: Vec<Upload>,
}

/// One upload received by the double.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Gofile server name, or `"buzz"`.
    pub target: String,
    pub name: String,
    pub len: usize,
}

/// In-process destination serving discovery, both upload shapes and
/// fetch-back of stored files.
///
/// Gofile server names `fail` and `forbidden` answer 500 (HTML) and 403.
/// Buzzheavier names starting with `stall` are stored but never answered.
pub struct DestinationDouble {
    pub base: String,
    state: Arc<Mutex<DoubleState>>,
    handle: tokio::task::JoinHandle<()>,
}

impl DestinationDouble {
    /// Starts the double; discovery answers with `discovery_body`.
    pub async fn start(discovery_body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let base = format!("http://{addr}");
        let state = Arc::new(Mutex::new(DoubleState {
            base: base.clone(),
            discovery_body: discovery_body.to_string(),
            ..DoubleState::default()
        }));

        let app = Router::new()
            .route("/servers", get(discovery))
            .route("/{server}/uploadfile", post(gofile_upload))
            .route("/buzz/{name}", put(buzz_upload))
            .route("/d/{id}", get(fetch))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base,
            state,
            handle,
        }
    }

    /// Discovery body listing one server.
    pub fn listing(server: &str) -> String {
        format!(r#"{{"status":"ok","data":{{"servers":[{{"name":"{server}","zone":"eu"}}]}}}}"#)
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            gofile_discovery_url: format!("{}/servers", self.base),
            gofile_upload_url_template: format!("{}/{{server}}/uploadfile", self.base),
            gofile_fallback_server: "fallback".into(),
            buzzheavier_upload_base: format!("{}/buzz", self.base),
            buzzheavier_link_base: format!("{}/d", self.base),
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.state.lock().unwrap().uploads.clone()
    }

    /// Fetches a stored file back through its link.
    pub async fn fetch(link: &str) -> Vec<u8> {
        let resp = reqwest::get(link).await.unwrap();
        assert!(resp.status().is_success(), "fetch {link}: {}", resp.status());
        resp.bytes().await.unwrap().to_vec()
    }
}

impl Drop for DestinationDouble {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type Shared = Arc<Mutex<DoubleState>>;

async fn discovery(State(state): State<Shared>) -> Response {
    let body = state.lock().unwrap().discovery_body.clone();
    ([("content-type", "application/json")], body).into_response()
}

fn store(state: &Shared, target: &str, name: &str, data: Vec<u8>) -> String {
    let mut state = state.lock().unwrap();
    let id = format!("f{}", state.uploads.len());
    state.uploads.push(Upload {
        target: target.to_string(),
        name: name.to_string(),
        len: data.len(),
    });
    state.stored.insert(id.clone(), data);
    format!("{}/d/{id}", state.base)
}

async fn gofile_upload(
    State(state): State<Shared>,
    UrlPath(server): UrlPath<String>,
    mut multipart: Multipart,
) -> Response {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.unwrap().to_vec();
            file = Some((name, data));
        }
    }

    match server.as_str() {
        "fail" => (StatusCode::INTERNAL_SERVER_ERROR, "<html>Internal error</html>").into_response(),
        "forbidden" => (
            StatusCode::FORBIDDEN,
            r#"{"status":"error-notAuthorized"}"#,
        )
            .into_response(),
        _ => {
            let Some((name, data)) = file else {
                return (StatusCode::BAD_REQUEST, r#"{"status":"error-noFile"}"#).into_response();
            };
            let link = store(&state, &server, &name, data);
            axum::Json(serde_json::json!({
                "status": "ok",
                "data": { "downloadPage": link }
            }))
            .into_response()
        }
    }
}

async fn buzz_upload(
    State(state): State<Shared>,
    UrlPath(name): UrlPath<String>,
    body: Bytes,
) -> Response {
    let link = store(&state, "buzz", &name, body.to_vec());
    if name.starts_with("stall") {
        return std::future::pending().await;
    }
    axum::Json(serde_json::json!({ "url": link })).into_response()
}

async fn fetch(State(state): State<Shared>, UrlPath(id): UrlPath<String>) -> Response {
    match state.lock().unwrap().stored.get(&id) {
        Some(data) => data.clone().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub fn orchestrator(
    chat: Arc<MockChat>,
    double: &DestinationDouble,
    staging_dir: &Path,
    family: DestinationFamily,
    chunk_size: usize,
) -> RelayOrchestrator {
    let endpoints = Arc::new(double.endpoints());
    let http = reqwest::Client::new();
    let resolver = DestinationResolver::new(http.clone(), endpoints.clone())
        .with_timeout(Duration::from_secs(2));
    let uploader = UploadClient::new(http, endpoints);
    let config = RelayConfig {
        chunk_size,
        throttle_window: Duration::ZERO,
        staging_dir: staging_dir.to_path_buf(),
        profile: DestinationProfile {
            family,
            credential: Some("secret".into()),
        },
        notify_timeout: Duration::from_secs(2),
        progress_send_wait: Duration::from_secs(2),
    };
    RelayOrchestrator::new(chat, resolver, uploader, config)
}

/// `true` when the staging directory holds no files.
pub fn staging_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(e) => e.kind() == io::ErrorKind::NotFound,
    }
}
