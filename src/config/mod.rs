//! Configuration module
//!
//! Loaded from an optional TOML file; every section and field has a
//! default, and the monitor's CLI flags override file values.
//!
//! # Example
//! ```ignore
//! let config = Config::load("nuprism.toml")?;
//! let addr = config.network.bind_address()?;
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::protocol::constants::DATA_PACKET_SIZE;
use crate::protocol::PayloadLayout;
use crate::store::DEFAULT_MAX_SAMPLES;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid value: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ingest: IngestFileConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_samples == 0 {
            return Err(ConfigError::Invalid("store.max_samples must be > 0".into()));
        }
        // A datagram cut to the buffer size must never match a packet length
        if self.network.recv_buffer_size <= DATA_PACKET_SIZE {
            return Err(ConfigError::Invalid(format!(
                "network.recv_buffer_size must be > {}, got {}",
                DATA_PACKET_SIZE, self.network.recv_buffer_size
            )));
        }
        if self.ingest.report_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "ingest.report_interval_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Network Configuration
// =============================================================================

/// UDP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Local address to bind (all interfaces by default)
    #[serde(default = "default_bind")]
    pub bind: String,

    /// UDP port the module sends to
    #[serde(default = "default_port")]
    pub port: u16,

    /// NuPRISM module address. When set, datagrams from other hosts are dropped.
    #[serde(default)]
    pub module_ip: Option<IpAddr>,

    /// Receive buffer per datagram; longer datagrams are truncated by the OS.
    /// Must exceed the data packet size.
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1500
}

fn default_recv_buffer_size() -> usize {
    1500 // Ethernet MTU
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            module_ip: None,
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl NetworkConfig {
    /// Socket address to bind the listener to
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("network.bind '{}': {}", self.bind, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Samples kept per channel
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_max_samples() -> usize {
    DEFAULT_MAX_SAMPLES
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_samples: default_max_samples(),
        }
    }
}

// =============================================================================
// Ingest Configuration
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IngestFileConfig {
    /// Sleep after an empty receive
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Throughput report period
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    #[serde(default)]
    pub payload_layout: PayloadLayout,
}

fn default_poll_interval_ms() -> u64 {
    1
}

fn default_report_interval_ms() -> u64 {
    2000
}

impl Default for IngestFileConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            payload_layout: PayloadLayout::default(),
        }
    }
}

impl IngestFileConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

// =============================================================================
// Tests
// =============================================================================
