//! Bot configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. TOML file: `$FILERELAY_CONFIG`, else `~/.config/filerelay/relay.toml`
//!    when it exists
//! 3. `FILERELAY_*` environment variables

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use filerelay_destinations::{DestinationFamily, DestinationProfile, Endpoints};
use filerelay_relay::RelayConfig;
use filerelay_transfer::{DEFAULT_CHUNK_SIZE, DEFAULT_THROTTLE_WINDOW};
use serde::{Deserialize, Serialize};

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Telegram bot token. Required.
    #[serde(default)]
    pub bot_token: String,

    /// Destination every file is uploaded to.
    #[serde(default = "default_destination")]
    pub destination: DestinationFamily,

    /// Destination account token; anonymous uploads when absent.
    #[serde(default)]
    pub destination_token: Option<String>,

    /// Read size of both streaming phases, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum interval between progress edits, in milliseconds.
    #[serde(default = "default_throttle_window_ms")]
    pub throttle_window_ms: u64,

    /// Directory holding in-flight staging files.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Bot API base URL (a local Bot API server lifts the download limit).
    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,

    /// Long-polling timeout of `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Deadline of the server discovery request, in seconds.
    #[serde(default = "default_discovery_timeout_secs")]
    pub discovery_timeout_secs: u64,

    /// Deadline of one status-message edit, in seconds.
    #[serde(default = "default_notify_timeout_secs")]
    pub notify_timeout_secs: u64,

    #[serde(default)]
    pub endpoints: Endpoints,
}

fn default_destination() -> DestinationFamily {
    DestinationFamily::Gofile
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_throttle_window_ms() -> u64 {
    DEFAULT_THROTTLE_WINDOW.as_millis() as u64
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("filerelay")
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".into()
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_discovery_timeout_secs() -> u64 {
    10
}

fn default_notify_timeout_secs() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            destination: default_destination(),
            destination_token: None,
            chunk_size: default_chunk_size(),
            throttle_window_ms: default_throttle_window_ms(),
            staging_dir: default_staging_dir(),
            telegram_api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout_secs(),
            discovery_timeout_secs: default_discovery_timeout_secs(),
            notify_timeout_secs: default_notify_timeout_secs(),
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the file and the process environment.
    pub fn load() -> anyhow::Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path(&env)?;
        Self::load_from(path.as_deref(), env)
    }

    /// Loads from an optional file, then applies overrides from `env`.
    pub fn load_from(
        path: Option<&Path>,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let config: Config = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", path.display()))?;
                tracing::debug!(path = %path.display(), "configuration file read");
                config
            }
            None => Config::default(),
        };
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = env("FILERELAY_BOT_TOKEN") {
            self.bot_token = token;
        }
        if let Some(destination) = env("FILERELAY_DESTINATION") {
            self.destination = DestinationFamily::from_str(&destination)
                .map_err(|e| anyhow::anyhow!("FILERELAY_DESTINATION: {e}"))?;
        }
        if let Some(token) = env("FILERELAY_DESTINATION_TOKEN") {
            self.destination_token = Some(token);
        }
        if let Some(size) = env("FILERELAY_CHUNK_SIZE") {
            self.chunk_size = parse_number("FILERELAY_CHUNK_SIZE", &size)?;
        }
        if let Some(window) = env("FILERELAY_THROTTLE_WINDOW_MS") {
            self.throttle_window_ms = parse_number("FILERELAY_THROTTLE_WINDOW_MS", &window)?;
        }
        if let Some(dir) = env("FILERELAY_STAGING_DIR") {
            self.staging_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.bot_token.trim().is_empty() {
            bail!("bot_token is required (set FILERELAY_BOT_TOKEN)");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.poll_timeout_secs > 300 {
            bail!("poll_timeout_secs must be at most 300");
        }
        if self.telegram_api_url.trim().is_empty() {
            bail!("telegram_api_url must not be empty");
        }
        if !self.endpoints.gofile_upload_url_template.contains("{server}") {
            bail!("endpoints.gofile_upload_url_template must contain {{server}}");
        }
        Ok(())
    }

    /// Relay settings derived from this configuration.
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            chunk_size: self.chunk_size,
            throttle_window: Duration::from_millis(self.throttle_window_ms),
            staging_dir: self.staging_dir.clone(),
            profile: DestinationProfile {
                family: self.destination,
                credential: self
                    .destination_token
                    .clone()
                    .filter(|t| !t.trim().is_empty()),
            },
            notify_timeout: Duration::from_secs(self.notify_timeout_secs),
            ..RelayConfig::default()
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{key}: invalid number {value:?}"))
}

/// Returns the configuration file to read, if any.
///
/// An explicit `FILERELAY_CONFIG` must exist; the default location is
/// optional.
fn config_path(env: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(explicit) = env("FILERELAY_CONFIG") {
        let path = PathBuf::from(explicit);
        if !path.exists() {
            bail!("FILERELAY_CONFIG points to missing file {}", path.display());
        }
        return Ok(Some(path));
    }

    let home = env("HOME").unwrap_or_else(|| "/tmp".into());
    let path = PathBuf::from(home)
        .join(".config")
        .join("filerelay")
        .join("relay.toml");
    Ok(path.exists().then_some(path))
}
