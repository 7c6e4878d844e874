//! Coordinator configuration – reads/writes `~/.meshfleet/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use meshfleet_runtime::GatewayConfig;
use serde::{Deserialize, Serialize};

/// Persisted coordinator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `host:port` of the serial-over-TCP bridge to the radio coprocessor.
    #[serde(default = "default_link_addr")]
    pub link_addr: String,

    /// Use the in-process simulated coprocessor instead of `link_addr`.
    #[serde(default)]
    pub simulate: bool,

    /// Token echoed by the coprocessor during the link handshake.
    #[serde(default = "default_handshake_token")]
    pub handshake_token: u16,

    #[serde(default = "default_transmit_timeout_ms")]
    pub transmit_timeout_ms: u64,

    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Events buffered per module mailbox before new ones are dropped.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_link_addr() -> String {
    "127.0.0.1:7000".to_string()
}
fn default_handshake_token() -> u16 {
    0x1010
}
fn default_transmit_timeout_ms() -> u64 {
    1000
}
fn default_ack_timeout_ms() -> u64 {
    2000
}
fn default_mailbox_capacity() -> usize {
    64
}

impl Default for Config {
    fn default() -> Self {
        Self {
            link_addr: default_link_addr(),
            simulate: false,
            handshake_token: default_handshake_token(),
            transmit_timeout_ms: default_transmit_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl Config {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            handshake_token: self.handshake_token,
            transmit_timeout: Duration::from_millis(self.transmit_timeout_ms),
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
        }
    }
}

/// `MESHFLEET_CONFIG` if set, otherwise `~/.meshfleet/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("MESHFLEET_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".meshfleet").join("config.toml")
}

/// Load the config from `path` and apply environment overrides.
/// Returns `None` if the file does not exist.
pub fn load(path: &Path) -> Result<Option<Config>, String> {
    let Some(mut cfg) = load_from(path)? else {
        return Ok(None);
    };
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load the file at `path` as-is.
pub fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `MESHFLEET_*` environment overrides.  Unparsable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `MESHFLEET_LINK_ADDR` | `link_addr` |
/// | `MESHFLEET_SIMULATE` | `simulate` (`1`/`true`) |
/// | `MESHFLEET_ACK_TIMEOUT_MS` | `ack_timeout_ms` |
/// | `MESHFLEET_MAILBOX_CAPACITY` | `mailbox_capacity` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("MESHFLEET_LINK_ADDR") {
        cfg.link_addr = v;
    }
    if let Ok(v) = std::env::var("MESHFLEET_SIMULATE") {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => cfg.simulate = true,
            "0" | "false" | "no" => cfg.simulate = false,
            _ => {}
        }
    }
    if let Ok(v) = std::env::var("MESHFLEET_ACK_TIMEOUT_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.ack_timeout_ms = ms;
    }
    if let Ok(v) = std::env::var("MESHFLEET_MAILBOX_CAPACITY")
        && let Ok(n) = v.parse::<usize>()
        && n > 0
    {
        cfg.mailbox_capacity = n;
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create config directory: {}", e))?;
    }
    let raw = toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    fs::write(path, raw).map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))
}
