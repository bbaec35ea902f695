//! Server configuration module
//!
//! Parses and manages ingress configuration from YAML files. Every field has
//! a default, so an empty document is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::network::wire::{LED_DATA_SIZE, NUM_BANDS, STANDARD_DATA_HEADER_SIZE};

/// LED count the default maximum packet size is sized for.
pub const DEFAULT_MAX_LEDS: usize = 4096;

/// Ingress server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressConfig {
    // ============================================
    // Listener
    // ============================================
    #[serde(default = "default_listen_ip")]
    pub listen_ip: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Per-read receive timeout. A frame that stalls longer ends the session.
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,

    // ============================================
    // Framing limits
    // ============================================
    /// Largest frame (header included) the read and expansion buffers hold.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    /// Band count a peak frame must carry.
    #[serde(default = "default_num_bands")]
    pub num_bands: u16,

    // ============================================
    // Feature toggles
    // ============================================
    /// Deliver peak frames to the consumer. When off they are read and dropped.
    #[serde(default)]
    pub audio_enabled: bool,

    /// Copy the compressed body into a separate staging buffer before
    /// expanding it, for targets whose frame buffer lives in slow memory.
    #[serde(default)]
    pub stage_compressed: bool,

    // ============================================
    // Device
    // ============================================
    /// Reported in every status response.
    #[serde(default = "default_flash_version")]
    pub flash_version: u32,

    /// Capacity of the LED frame ring.
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    #[serde(default = "default_brightness")]
    pub brightness: u8,
}

fn default_listen_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    49152
}

fn default_receive_timeout_ms() -> u64 {
    3000
}

fn default_max_packet_size() -> usize {
    STANDARD_DATA_HEADER_SIZE + LED_DATA_SIZE * DEFAULT_MAX_LEDS
}

fn default_num_bands() -> u16 {
    NUM_BANDS
}

fn default_flash_version() -> u32 {
    1
}

fn default_buffer_count() -> usize {
    500
}

fn default_brightness() -> u8 {
    255
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            listen_ip: default_listen_ip(),
            listen_port: default_listen_port(),
            receive_timeout_ms: default_receive_timeout_ms(),
            max_packet_size: default_max_packet_size(),
            num_bands: default_num_bands(),
            audio_enabled: false,
            stage_compressed: false,
            flash_version: default_flash_version(),
            buffer_count: default_buffer_count(),
            brightness: default_brightness(),
        }
    }
}

impl IngressConfig {
    /// Load configuration from a YAML file
    ///
    /// # Example
    /// ```no_run
    /// use ledsock::config::IngressConfig;
    ///
    /// let config = IngressConfig::from_file("conf/ingress.yaml")
    ///     .expect("Failed to load config");
    /// println!("port: {}", config.listen_port);
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: IngressConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML in {}", path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a YAML string
    pub fn from_str(contents: &str) -> Result<Self> {
        let config: IngressConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML")?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.listen_ip.is_empty(), "listen_ip cannot be empty");
        anyhow::ensure!(
            self.receive_timeout_ms > 0,
            "receive_timeout_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.max_packet_size >= STANDARD_DATA_HEADER_SIZE,
            "max_packet_size too small: {} (min {})",
            self.max_packet_size,
            STANDARD_DATA_HEADER_SIZE
        );
        anyhow::ensure!(self.num_bands > 0, "num_bands must be greater than zero");
        anyhow::ensure!(self.buffer_count > 0, "buffer_count must be greater than zero");

        Ok(())
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(&self).context("Failed to serialize config to YAML")?;

        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config to {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_ip, self.listen_port)
    }
}
