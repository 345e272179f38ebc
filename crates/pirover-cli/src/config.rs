//! Configuration Vault – reads/writes `~/.pirover/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Persisted operator configuration stored in `~/.pirover/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Network locator of the rover's video stream.
    #[serde(default = "default_stream_uri")]
    pub stream_uri: String,

    /// `host:port` the control packets are sent to.
    #[serde(default = "default_control_addr")]
    pub control_addr: String,

    /// Interval between control packets, in milliseconds.
    #[serde(default = "default_control_period_ms")]
    pub control_period_ms: u64,
}

fn default_stream_uri() -> String {
    "rtsp://172.24.1.1:8554/test".to_string()
}
fn default_control_addr() -> String {
    "172.24.1.1:5005".to_string()
}
fn default_control_period_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stream_uri: default_stream_uri(),
            control_addr: default_control_addr(),
            control_period_ms: default_control_period_ms(),
        }
    }
}

impl Config {
    /// Parsed [`control_addr`][Self::control_addr].
    pub fn control_socket_addr(&self) -> Result<SocketAddr, String> {
        self.control_addr
            .parse()
            .map_err(|e| format!("Invalid control address '{}': {}", self.control_addr, e))
    }

    /// Packet interval; a zero period falls back to the default.
    pub fn control_period(&self) -> Duration {
        match self.control_period_ms {
            0 => Duration::from_millis(default_control_period_ms()),
            ms => Duration::from_millis(ms),
        }
    }
}

/// Return the path to `~/.pirover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".pirover").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  Returns
/// `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    let mut cfg = load_from(&config_path())?;
    if let Some(cfg) = cfg.as_mut() {
        apply_env_overrides(cfg);
    }
    Ok(cfg)
}

pub(crate) fn load_from(path: &PathBuf) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    Ok(Some(cfg))
}

/// Apply `PIROVER_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `PIROVER_STREAM_URI` | `stream_uri` |
/// | `PIROVER_CONTROL_ADDR` | `control_addr` |
/// | `PIROVER_CONTROL_PERIOD_MS` | `control_period_ms` |
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("PIROVER_STREAM_URI") {
        cfg.stream_uri = v;
    }
    if let Ok(v) = std::env::var("PIROVER_CONTROL_ADDR") {
        cfg.control_addr = v;
    }
    if let Ok(v) = std::env::var("PIROVER_CONTROL_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.control_period_ms = ms;
    }
}

/// Save the config to disk, creating `~/.pirover/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &PathBuf) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
