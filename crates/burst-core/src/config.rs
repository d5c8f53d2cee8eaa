//! Configuration system for burst.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BURST_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/burst/config.toml
//!   3. ~/.config/burst/config.toml

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BurstConfig {
    pub link: LinkConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Network name to associate with.
    pub ssid: String,
    pub passphrase: String,
    /// Fixed address instead of DHCP. Absent = acquire dynamically.
    pub static_address: Option<StaticAddress>,
    /// Max seconds to wait for the link at startup. 0 = wait forever.
    pub connect_timeout_secs: u64,
}

/// Static IPv4 assignment for the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAddress {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port to listen on. 0 = OS-assigned.
    pub port: u16,
    /// Accepted-but-unhandled connection queue length.
    pub backlog: u32,
    /// Bytes streamed to every client.
    pub total_bytes: u64,
    /// Bytes per write.
    pub chunk_size: usize,
    /// Pause after each chunk, in milliseconds. 0 = no pause.
    pub pacing_ms: u64,
    /// Max concurrent client transfers. 0 = unlimited.
    pub max_clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: Ipv4Addr,
    pub server_port: u16,
    /// Bytes expected per connection.
    pub total_bytes: u64,
    /// Receive scratch buffer size.
    pub buffer_size: usize,
    /// A read that stays idle this long ends the transfer.
    pub idle_timeout_secs: u64,
    /// Cooldown after a failed socket creation.
    pub socket_retry_ms: u64,
    /// Cooldown after a failed connect.
    pub connect_retry_ms: u64,
    /// Cooldown after a finished transfer, before reconnecting.
    pub cycle_cooldown_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_TOTAL_BYTES: u64 = 100_000;
/// One Ethernet MSS worth of payload.
pub const DEFAULT_CHUNK_SIZE: usize = 1460;

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            passphrase: String::new(),
            static_address: None,
            connect_timeout_secs: 0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            backlog: 5,
            total_bytes: DEFAULT_TOTAL_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing_ms: 1,
            max_clients: 8,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: Ipv4Addr::new(10, 180, 196, 150),
            server_port: DEFAULT_PORT,
            total_bytes: DEFAULT_TOTAL_BYTES,
            buffer_size: DEFAULT_CHUNK_SIZE,
            idle_timeout_secs: 5,
            socket_retry_ms: 2_000,
            connect_retry_ms: 3_000,
            cycle_cooldown_ms: 2_000,
        }
    }
}

// ── Derived durations ─────────────────────────────────────────────────────────

impl LinkConfig {
    /// `None` means wait for the link indefinitely.
    pub fn connect_timeout(&self) -> Option<Duration> {
        match self.connect_timeout_secs {
            0 => None,
            s => Some(Duration::from_secs(s)),
        }
    }
}

impl ServerConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

impl ClientConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn socket_retry(&self) -> Duration {
        Duration::from_millis(self.socket_retry_ms)
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    pub fn cycle_cooldown(&self) -> Duration {
        Duration::from_millis(self.cycle_cooldown_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("burst")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BurstConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load from an explicit path, then apply env overrides and validate.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            BurstConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BURST_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BurstConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BURST_* overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("BURST_LINK__SSID") {
            self.link.ssid = v;
        }
        if let Some(v) = lookup("BURST_LINK__PASSPHRASE") {
            self.link.passphrase = v;
        }
        parse_into(&lookup, "BURST_LINK__CONNECT_TIMEOUT_SECS", &mut self.link.connect_timeout_secs);
        parse_into(&lookup, "BURST_SERVER__PORT", &mut self.server.port);
        parse_into(&lookup, "BURST_SERVER__TOTAL_BYTES", &mut self.server.total_bytes);
        parse_into(&lookup, "BURST_SERVER__CHUNK_SIZE", &mut self.server.chunk_size);
        parse_into(&lookup, "BURST_SERVER__PACING_MS", &mut self.server.pacing_ms);
        parse_into(&lookup, "BURST_SERVER__MAX_CLIENTS", &mut self.server.max_clients);
        parse_into(&lookup, "BURST_CLIENT__SERVER_ADDR", &mut self.client.server_addr);
        parse_into(&lookup, "BURST_CLIENT__SERVER_PORT", &mut self.client.server_port);
        parse_into(&lookup, "BURST_CLIENT__TOTAL_BYTES", &mut self.client.total_bytes);
        parse_into(&lookup, "BURST_CLIENT__IDLE_TIMEOUT_SECS", &mut self.client.idle_timeout_secs);
    }

    /// Reject values the transfer engines cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(bool, &'static str, &'static str); 6] = [
            (self.server.chunk_size == 0, "server.chunk_size", "must be non-zero"),
            (self.server.total_bytes == 0, "server.total_bytes", "must be non-zero"),
            (self.server.backlog == 0, "server.backlog", "must be non-zero"),
            (self.client.buffer_size == 0, "client.buffer_size", "must be non-zero"),
            (self.client.total_bytes == 0, "client.total_bytes", "must be non-zero"),
            (self.client.idle_timeout_secs == 0, "client.idle_timeout_secs", "must be non-zero"),
        ];
        match checks.iter().find(|(bad, _, _)| *bad) {
            Some(&(_, field, reason)) => Err(ConfigError::Invalid { field, reason }),
            None => Ok(()),
        }
    }
}

/// Unparseable values are ignored, keeping the previous setting.
fn parse_into<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) {
    if let Some(parsed) = lookup(key).and_then(|v| v.parse().ok()) {
        *slot = parsed;
    }
}
