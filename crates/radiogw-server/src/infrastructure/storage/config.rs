//! TOML-based configuration for the gateway.
//!
//! The config file is looked up in this order:
//!
//! 1. the path given with `--config` (or `RADIOGW_CONFIG`),
//! 2. `$XDG_CONFIG_HOME/radiogw/config.toml`,
//! 3. `~/.config/radiogw/config.toml`.
//!
//! A missing file is not an error: every field has a default, so the gateway
//! runs out of the box against `plughw:1,0` and `/dev/ttyUSB0`.
//!
//! ```toml
//! [network]
//! bind_address = "127.0.0.1"
//! port = 9092
//!
//! [audio]
//! device = "plughw:1,0"
//! period_frames = 160
//!
//! [ptt]
//! serial_port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! keying_delay_ms = 100
//! debounce_ms = 300
//! toggle_digit = "*"
//! transmit_idle_ms = 20
//!
//! [logging]
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent, so a file only needs to name the
//! settings it changes.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use radiogw_core::protocol::messages::{BYTES_PER_SAMPLE, CHANNELS, MAX_PAYLOAD_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::audio::AudioParams;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The file parsed but a value is out of range.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub ptt: PttConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening socket settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Address to bind.  Keep it on loopback unless the port is firewalled;
    /// the protocol has no authentication.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Sound-card settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// ALSA device name.
    #[serde(default = "default_device")]
    pub device: String,
    /// Frames per period; one period becomes one SOUND message.
    #[serde(default = "default_period_frames")]
    pub period_frames: usize,
}

/// Push-to-talk line and toggle behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PttConfig {
    /// Serial device whose RTS line keys the transmitter.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Wait after asserting RTS (PTT ON) before the transition counts as done.
    /// Releasing PTT takes effect immediately.
    #[serde(default = "default_keying_delay_ms")]
    pub keying_delay_ms: u64,
    /// Minimum spacing between accepted toggle digits.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// DTMF digit that toggles PTT.
    #[serde(default = "default_toggle_digit")]
    pub toggle_digit: String,
    /// Transmit-loop sleep while PTT is on.
    #[serde(default = "default_transmit_idle_ms")]
    pub transmit_idle_ms: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"radiogw_server=debug"`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    9092
}
fn default_device() -> String {
    crate::infrastructure::audio::DEFAULT_DEVICE.to_string()
}
fn default_period_frames() -> usize {
    crate::infrastructure::audio::DEFAULT_PERIOD_FRAMES
}
fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_keying_delay_ms() -> u64 {
    100
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_toggle_digit() -> String {
    "*".to_string()
}
fn default_transmit_idle_ms() -> u64 {
    20
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            period_frames: default_period_frames(),
        }
    }
}

impl Default for PttConfig {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            keying_delay_ms: default_keying_delay_ms(),
            debounce_ms: default_debounce_ms(),
            toggle_digit: default_toggle_digit(),
            transmit_idle_ms: default_transmit_idle_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ── Derived values ────────────────────────────────────────────────────────────

impl AppConfig {
    /// Checks values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr()?;

        if self.ptt.toggle_digit.chars().count() != 1 {
            return Err(ConfigError::Invalid {
                field: "ptt.toggle_digit",
                reason: format!("expected one character, got {:?}", self.ptt.toggle_digit),
            });
        }
        if self.ptt.baud_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "ptt.baud_rate",
                reason: "must be greater than zero".to_string(),
            });
        }

        let frame_bytes = self.audio.period_frames * CHANNELS as usize * BYTES_PER_SAMPLE;
        if self.audio.period_frames == 0 || frame_bytes > MAX_PAYLOAD_SIZE {
            return Err(ConfigError::Invalid {
                field: "audio.period_frames",
                reason: format!(
                    "{} frames do not fit one SOUND message (1..={})",
                    self.audio.period_frames,
                    MAX_PAYLOAD_SIZE / (CHANNELS as usize * BYTES_PER_SAMPLE)
                ),
            });
        }
        Ok(())
    }

    /// Socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .network
            .bind_address
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                field: "network.bind_address",
                reason: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    pub fn audio_params(&self) -> AudioParams {
        AudioParams::new(self.audio.device.clone(), self.audio.period_frames)
    }

    /// First character of `toggle_digit`, or `*` if it is empty.
    pub fn toggle_digit(&self) -> char {
        self.ptt.toggle_digit.chars().next().unwrap_or('*')
    }

    pub fn keying_delay(&self) -> Duration {
        Duration::from_millis(self.ptt.keying_delay_ms)
    }

    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.ptt.debounce_ms)
    }

    pub fn transmit_idle(&self) -> Duration {
        Duration::from_millis(self.ptt.transmit_idle_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when neither
/// `XDG_CONFIG_HOME` nor `HOME` is set.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads the config from `explicit` if given, otherwise from the default
/// location.  A missing default file yields `AppConfig::default()`; a missing
/// explicit file is an error.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors, [`ConfigError::Parse`]
/// for malformed TOML and [`ConfigError::Invalid`] for out-of-range values.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        return parse_config(&content);
    }

    match config_file_path() {
        Ok(path) => load_config_from(&path),
        // No HOME at all (e.g. a bare service account): run on defaults.
        Err(ConfigError::NoPlatformConfigDir) => Ok(AppConfig::default()),
        Err(e) => Err(e),
    }
}

/// Loads the config at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// As for [`load_config`].
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_config(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

fn parse_config(content: &str) -> Result<AppConfig, ConfigError> {
    let cfg: AppConfig = toml::from_str(content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Resolves `$XDG_CONFIG_HOME/radiogw` or `~/.config/radiogw`.
fn platform_config_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("radiogw"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
