//! TOML-based settings persistence.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Scancast\config.toml`
//! - Linux:    `~/.config/scancast/config.toml`
//! - macOS:    `~/Library/Application Support/Scancast/config.toml`
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]` so the app works on
//! first run (no file yet) and keeps working when upgrading from an older
//! file that is missing newer fields.  A missing file altogether loads
//! [`AppConfig::default`].

use std::net::IpAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::route_scan::ScanMode;
use crate::infrastructure::network::ServerConfig;

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

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The stored bind address is not a valid IP address.
    #[error("invalid bind address in config: {value}")]
    InvalidBindAddress { value: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub server: ServerSettings,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Scanning behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScannerConfig {
    /// Where qualified scans are routed.
    #[serde(default)]
    pub mode: ScanMode,
    /// Minimum gap in milliseconds before an identical payload is accepted again.
    #[serde(default = "default_throttle_ms")]
    pub throttle_window_ms: u64,
}

/// Broadcast server listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    /// TCP port the WebSocket listener binds.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address; `0.0.0.0` accepts connections from the whole LAN.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_throttle_ms() -> u64 {
    300
}
fn default_port() -> u16 {
    8080
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerConfig::default(),
            server: ServerSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::default(),
            throttle_window_ms: default_throttle_ms(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl ServerSettings {
    /// Builds the immutable [`ServerConfig`] for one server instance.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] when the stored bind
    /// address does not parse as an IP address.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let bind_address: IpAddr =
            self.bind_address
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress {
                    value: self.bind_address.clone(),
                })?;
        Ok(ServerConfig {
            bind_address,
            port: self.port,
        })
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from disk, returning `AppConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory including the `Scancast`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Scancast"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("scancast"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/Scancast
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Scancast")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_original_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.scanner.mode, ScanMode::WifiBroadcast);
        assert_eq!(cfg.scanner.throttle_window_ms, 300);
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty config must parse");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_toml_fills_missing_fields_with_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9000
            "#,
        )
        .expect("partial config must parse");
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind_address, "0.0.0.0");
        assert_eq!(cfg.scanner.mode, ScanMode::WifiBroadcast);
    }

    #[test]
    fn test_scan_mode_round_trips_through_toml() {
        let mut cfg = AppConfig::default();
        cfg.scanner.mode = ScanMode::CopyOnly;
        let text = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: AppConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_unknown_scan_mode_fails_to_parse() {
        let result: Result<AppConfig, _> = toml::from_str(
            r#"
            [scanner]
            mode = "telepathy"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_to_server_config_parses_bind_address() {
        let settings = ServerSettings {
            port: 9000,
            bind_address: "127.0.0.1".to_string(),
        };
        let cfg = settings.to_server_config().expect("valid address");
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.bind_address.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_to_server_config_rejects_garbage_address() {
        let settings = ServerSettings {
            port: 9000,
            bind_address: "not-an-ip".to_string(),
        };
        assert!(matches!(
            settings.to_server_config(),
            Err(ConfigError::InvalidBindAddress { .. })
        ));
    }
}
