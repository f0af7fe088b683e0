//! Client configuration

use anyhow::{bail, Result};
use pixelpost_protocol::DEFAULT_MAX_FRAME_SIZE;
use pixelpost_transport::FramerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Client configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Frame and I/O limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Where received files go
    #[serde(default)]
    pub output: OutputConfig,
}

impl ClientConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file does not exist
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path).await
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection.endpoint.is_empty() {
            bail!("connection.endpoint must not be empty");
        }
        if self.limits.max_frame_size == 0 || self.limits.max_frame_size > u32::MAX as usize {
            bail!(
                "limits.max_frame_size must be between 1 and {}",
                u32::MAX
            );
        }
        Ok(())
    }

    pub fn framer_config(&self) -> FramerConfig {
        FramerConfig {
            max_frame_size: self.limits.max_frame_size,
            io_timeout: Duration::from_secs(self.limits.io_timeout_secs),
        }
    }
}

/// Connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Responder address (host:port)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Extra attempts after the first failure
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Delay before the first retry, doubled after each failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_endpoint() -> String {
    "127.0.0.1:7878".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retries: default_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Frame and I/O limits
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Largest frame payload in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,

    /// Per-frame read/write timeout
    #[serde(default = "default_io_timeout_secs")]
    pub io_timeout_secs: u64,
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

fn default_io_timeout_secs() -> u64 {
    30
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory received files are written to
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}
