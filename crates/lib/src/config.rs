//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.promptrelay/config.json`), then
//! environment overrides are applied; the CLI applies its flags last.

use crate::filter::{SessionPolicy, DEFAULT_SESSION};
use crate::forward::DEFAULT_ADDRESS;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level relay config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Prompt server (Socket.IO) endpoint.
    #[serde(default)]
    pub server: ServerConfig,

    /// Session id and filtering policy.
    #[serde(default)]
    pub session: SessionConfig,

    /// OSC destination.
    #[serde(default)]
    pub forward: ForwardConfig,

    /// Optional bounded reconnect after a dropped connection.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Base URL (http, https, ws or wss). Default "http://localhost:3451".
    #[serde(default = "default_server_url")]
    pub url: String,

    /// App path the server mounts Socket.IO under; "/socket.io" is appended. Default "masterprompt".
    #[serde(default = "default_server_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Local session identifier. Default "1".
    #[serde(default = "default_session_id")]
    pub id: String,

    /// "none", "tag", "strict" (default) or "echo".
    #[serde(default)]
    pub policy: SessionPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardConfig {
    /// Listener host (default "127.0.0.1").
    #[serde(default = "default_forward_host")]
    pub host: String,

    /// Listener UDP port (default 4800).
    #[serde(default = "default_forward_port")]
    pub port: u16,

    /// OSC address pattern (default "/mensaje").
    #[serde(default = "default_forward_address")]
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectConfig {
    /// Reconnect attempts after a drop or failed connect. 0 (default) exits instead.
    #[serde(default)]
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds (default 2000).
    #[serde(default = "default_reconnect_delay_ms")]
    pub delay_ms: u64,
}

fn default_server_url() -> String {
    "http://localhost:3451".to_string()
}

fn default_server_path() -> String {
    "masterprompt".to_string()
}

fn default_session_id() -> String {
    DEFAULT_SESSION.to_string()
}

fn default_forward_host() -> String {
    "127.0.0.1".to_string()
}

fn default_forward_port() -> u16 {
    4800
}

fn default_forward_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: default_server_url(),
            path: default_server_path(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: default_session_id(),
            policy: SessionPolicy::default(),
        }
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            host: default_forward_host(),
            port: default_forward_port(),
            address: default_forward_address(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Non-empty, trimmed value of an environment variable.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Apply PROMPTRELAY_SERVER_URL and PROMPTRELAY_SESSION over file values.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(url) = env_non_empty("PROMPTRELAY_SERVER_URL") {
        config.server.url = url;
    }
    if let Some(session) = env_non_empty("PROMPTRELAY_SESSION") {
        config.session.id = session;
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("PROMPTRELAY_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".promptrelay").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path, PROMPTRELAY_CONFIG_PATH, or the default. Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
