//! Daemon configuration

use anyhow::{bail, Result};
use pixelpost_crypto::MIN_MODULUS_BITS;
use pixelpost_protocol::DEFAULT_MAX_FRAME_SIZE;
use pixelpost_transport::{FramerConfig, HandshakeConfig};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Daemon configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Served files
    #[serde(default)]
    pub files: FilesConfig,

    /// Frame and I/O limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,
}

impl DaemonConfig {
    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: DaemonConfig = toml::from_str(&content)?;
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
        if self.security.rsa_bits < MIN_MODULUS_BITS {
            bail!(
                "security.rsa_bits = {} is below the {} bit minimum",
                self.security.rsa_bits,
                MIN_MODULUS_BITS
            );
        }
        if self.server.max_connections == 0 {
            bail!("server.max_connections must be at least 1");
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
        self.limits.framer_config()
    }

    pub fn handshake_config(&self) -> HandshakeConfig {
        HandshakeConfig {
            rsa_bits: self.security.rsa_bits,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_bind() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 7878))
}

fn default_max_connections() -> usize {
    64
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_connections: default_max_connections(),
        }
    }
}

/// Served files
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Image sent in answer to `GetImage`
    #[serde(default = "default_image_path")]
    pub image_path: PathBuf,
}

fn default_image_path() -> PathBuf {
    PathBuf::from("cat.png")
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
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

impl LimitsConfig {
    pub fn framer_config(&self) -> FramerConfig {
        FramerConfig {
            max_frame_size: self.max_frame_size,
            io_timeout: Duration::from_secs(self.io_timeout_secs),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_frame_size: default_max_frame_size(),
            io_timeout_secs: default_io_timeout_secs(),
        }
    }
}

/// Security configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Modulus size of the per-connection RSA key
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
}

fn default_rsa_bits() -> usize {
    MIN_MODULUS_BITS
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rsa_bits: default_rsa_bits(),
        }
    }
}
