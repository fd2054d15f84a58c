//! Destination data types.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

/// Characters left untouched when a file name goes into a URL path.
const NAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Family of destination, deciding discovery, transfer shape and
/// response parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationFamily {
    Gofile,
    Buzzheavier,
}

impl DestinationFamily {
    /// Human-readable name.
    pub fn display_name(self) -> &'static str {
        match self {
            DestinationFamily::Gofile => "Gofile",
            DestinationFamily::Buzzheavier => "Buzzheavier",
        }
    }
}

impl std::str::FromStr for DestinationFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gofile" => Ok(DestinationFamily::Gofile),
            "buzzheavier" | "buzz" => Ok(DestinationFamily::Buzzheavier),
            other => Err(format!("unknown destination: {other}")),
        }
    }
}

impl std::fmt::Display for DestinationFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Configured destination before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationProfile {
    pub family: DestinationFamily,
    /// Account token / id. `None` uploads anonymously.
    pub credential: Option<String>,
}

/// How a destination's identifier was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    /// Never probed (family has no discovery endpoint).
    Unknown,
    /// Returned by the discovery endpoint.
    Listed,
    /// Discovery failed; the hard-coded fallback is used.
    Fallback,
}

/// A resolved upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub family: DestinationFamily,
    /// Server name (Gofile) or upload base URL (Buzzheavier).
    pub identifier: String,
    pub credential: Option<String>,
    pub reachability: Reachability,
}

impl Destination {
    /// Upload URL for `file_name` at this destination.
    pub fn upload_url(&self, endpoints: &Endpoints, file_name: &str) -> String {
        match self.family {
            DestinationFamily::Gofile => endpoints
                .gofile_upload_url_template
                .replace("{server}", &self.identifier),
            DestinationFamily::Buzzheavier => format!(
                "{}/{}",
                self.identifier.trim_end_matches('/'),
                encode_name(file_name)
            ),
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.family {
            DestinationFamily::Gofile => write!(f, "Gofile ({})", self.identifier),
            DestinationFamily::Buzzheavier => f.write_str("Buzzheavier"),
        }
    }
}

/// Percent-encodes a file name for use as a URL path segment.
pub fn encode_name(file_name: &str) -> String {
    utf8_percent_encode(file_name, NAME_ENCODE_SET).to_string()
}

/// Remote endpoints of every destination family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Gofile server listing.
    pub gofile_discovery_url: String,
    /// Gofile upload URL; `{server}` is replaced with the server name.
    pub gofile_upload_url_template: String,
    /// Server used when discovery fails.
    pub gofile_fallback_server: String,
    /// Buzzheavier upload base; the encoded file name is appended.
    pub buzzheavier_upload_base: String,
    /// Buzzheavier public link base, used when the response has no link.
    pub buzzheavier_link_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            gofile_discovery_url: "https://api.gofile.io/servers".into(),
            gofile_upload_url_template: "https://{server}.gofile.io/contents/uploadfile".into(),
            gofile_fallback_server: "store1".into(),
            buzzheavier_upload_base: "https://w.buzzheavier.com".into(),
            buzzheavier_link_base: "https://buzzheavier.com".into(),
        }
    }
}

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub link: String,
    /// `true` when the link was derived from request parameters because
    /// the response body could not be parsed.
    pub derived: bool,
}

// ---------------------------------------------------------------------------
// Gofile wire types
// ---------------------------------------------------------------------------

/// Body of `GET /servers`.
#[derive(Debug, Deserialize)]
pub(crate) struct ServersResponse {
    pub status: String,
    #[serde(default)]
    pub data: Option<ServersData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersData {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEntry {
    pub name: String,
    #[serde(default)]
    pub zone: String,
}
