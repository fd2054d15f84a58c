//! Destination resolution with discovery and static fallback.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::DestinationError;
use crate::types::{
    Destination, DestinationFamily, DestinationProfile, Endpoints, Reachability, ServersResponse,
};

/// Default deadline for the discovery request.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Picks the upload destination for a run.
///
/// Resolution queries the discovery endpoint once and takes the first
/// listed server. It never fails: any discovery error yields the configured
/// fallback server instead. Resolution is not retried within a run.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    http: reqwest::Client,
    endpoints: Arc<Endpoints>,
    timeout: Duration,
}

impl DestinationResolver {
    /// Creates a resolver using `http` for discovery requests.
    pub fn new(http: reqwest::Client, endpoints: Arc<Endpoints>) -> Self {
        Self {
            http,
            endpoints,
            timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }

    /// Overrides the discovery deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolves `profile` to a concrete destination.
    pub async fn resolve(&self, profile: &DestinationProfile) -> Destination {
        match profile.family {
            DestinationFamily::Buzzheavier => Destination {
                family: profile.family,
                identifier: self.endpoints.buzzheavier_upload_base.clone(),
                credential: profile.credential.clone(),
                reachability: Reachability::Unknown,
            },
            DestinationFamily::Gofile => {
                let (identifier, reachability) = match self.list_servers().await {
                    Ok(servers) => match servers.into_iter().next() {
                        Some(first) => (first, Reachability::Listed),
                        None => {
                            warn!("discovery returned no servers, using fallback");
                            self.fallback()
                        }
                    },
                    Err(e) => {
                        warn!(error = %e, "server discovery failed, using fallback");
                        self.fallback()
                    }
                };
                info!(server = %identifier, ?reachability, "destination resolved");
                Destination {
                    family: profile.family,
                    identifier,
                    credential: profile.credential.clone(),
                    reachability,
                }
            }
        }
    }

    /// Queries the discovery endpoint and returns server names in listed
    /// order.
    pub async fn list_servers(&self) -> Result<Vec<String>, DestinationError> {
        let request = self
            .http
            .get(&self.endpoints.gofile_discovery_url)
            .timeout(self.timeout);
        let resp = request.send().await?;
        let status = resp.status();

        if !status.is_success() {
            return Err(DestinationError::Discovery(format!("status {status}")));
        }

        let body = resp.bytes().await?;
        let parsed: ServersResponse = serde_json::from_slice(&body)?;
        if parsed.status != "ok" {
            return Err(DestinationError::Discovery(format!(
                "status field {:?}",
                parsed.status
            )));
        }

        let servers = parsed.data.map(|d| d.servers).unwrap_or_default();
        for server in &servers {
            debug!(server = %server.name, zone = %server.zone, "discovered server");
        }
        Ok(servers.into_iter().map(|s| s.name).collect())
    }

    fn fallback(&self) -> (String, Reachability) {
        (
            self.endpoints.gofile_fallback_server.clone(),
            Reachability::Fallback,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Starts a mock HTTP server that answers once with `status` and `body`.
    async fn mock_server(status: u16, body: &str) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/servers");
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = stream.read(&mut buf).await;

                let resp = format!(
                    "HTTP/1.1 {status} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, handle)
    }

    /// Starts a server that accepts a connection and never answers.
    async fn hanging_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/servers");

        let handle = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(60)).await;
                drop(stream);
            }
        });

        (url, handle)
    }

    fn resolver(discovery_url: String) -> DestinationResolver {
        let endpoints = Endpoints {
            gofile_discovery_url: discovery_url,
            ..Endpoints::default()
        };
        DestinationResolver::new(reqwest::Client::new(), Arc::new(endpoints))
            .with_timeout(Duration::from_millis(300))
    }

    fn gofile() -> DestinationProfile {
        DestinationProfile {
            family: DestinationFamily::Gofile,
            credential: Some("tok".into()),
        }
    }

    #[tokio::test]
    async fn first_listed_server_wins() {
        let (url, handle) = mock_server(
            200,
            r#"{"status":"ok","data":{"servers":[{"name":"store8","zone":"eu"},{"name":"store2","zone":"na"}]}}"#,
        )
        .await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.identifier, "store8");
        assert_eq!(dest.reachability, Reachability::Listed);
        assert_eq!(dest.credential.as_deref(), Some("tok"));

        handle.abort();
    }

    #[tokio::test]
    async fn non_200_status_falls_back() {
        let (url, handle) = mock_server(503, r#"{"status":"ok"}"#).await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.identifier, "store1");
        assert_eq!(dest.reachability, Reachability::Fallback);

        handle.abort();
    }

    #[tokio::test]
    async fn malformed_body_falls_back() {
        let (url, handle) = mock_server(200, "<html>maintenance</html>").await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.identifier, "store1");
        assert_eq!(dest.reachability, Reachability::Fallback);

        handle.abort();
    }

    #[tokio::test]
    async fn timeout_falls_back() {
        let (url, handle) = hanging_server().await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.identifier, "store1");
        assert_eq!(dest.reachability, Reachability::Fallback);

        handle.abort();
    }

    #[tokio::test]
    async fn error_status_field_falls_back() {
        let (url, handle) = mock_server(200, r#"{"status":"error"}"#).await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.identifier, "store1");

        handle.abort();
    }

    #[tokio::test]
    async fn empty_server_list_falls_back() {
        let (url, handle) = mock_server(200, r#"{"status":"ok","data":{"servers":[]}}"#).await;

        let dest = resolver(url).resolve(&gofile()).await;
        assert_eq!(dest.reachability, Reachability::Fallback);

        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_endpoint_falls_back() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let dest = resolver(format!("http://127.0.0.1:{port}/servers"))
            .resolve(&gofile())
            .await;
        assert_eq!(dest.identifier, "store1");
    }

    #[tokio::test]
    async fn buzzheavier_needs_no_discovery() {
        // The discovery URL is never contacted.
        let dest = resolver("http://127.0.0.1:9/unused".into())
            .resolve(&DestinationProfile {
                family: DestinationFamily::Buzzheavier,
                credential: None,
            })
            .await;
        assert_eq!(dest.family, DestinationFamily::Buzzheavier);
        assert_eq!(dest.identifier, "https://w.buzzheavier.com");
        assert_eq!(dest.reachability, Reachability::Unknown);
    }
}
