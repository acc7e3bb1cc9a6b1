//! Configuration file support

use docchat_client::DEFAULT_BASE_URL;
use docchat_tui::Theme;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configured backend address
pub const BASE_URL_ENV: &str = "DOCCHAT_BASE_URL";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for docchat
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend address
    pub base_url: Option<String>,
    /// Color theme (dark, light)
    pub theme: Option<String>,
    /// Seconds to wait for a connection before giving up
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docchat")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DOCCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults on any problem
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            theme: Some("dark".to_string()),
            connect_timeout_secs: Some(DEFAULT_CONNECT_TIMEOUT_SECS),
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Backend address: flag, then environment, then file, then default
    pub fn resolve_base_url(&self, flag: Option<String>) -> String {
        pick_base_url(flag, std::env::var(BASE_URL_ENV).ok(), self.base_url.clone())
    }

    pub fn theme(&self) -> Theme {
        match self.theme.as_deref() {
            None => Theme::default(),
            Some(name) => Theme::by_name(name).unwrap_or_else(|| {
                eprintln!("Warning: Unknown theme '{}', using dark", name);
                Theme::dark()
            }),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(
            self.connect_timeout_secs
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        )
    }
}

fn pick_base_url(flag: Option<String>, env: Option<String>, file: Option<String>) -> String {
    [flag, env, file]
        .into_iter()
        .flatten()
        .find(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# docchat configuration file
# Place at ~/.config/docchat/config.toml (Linux), ~/Library/Application Support/docchat/config.toml (Mac)
# or %APPDATA%\docchat\config.toml (Windows). DOCCHAT_CONFIG_PATH overrides the location.

# Backend address (DOCCHAT_BASE_URL and --base-url take precedence)
base_url = "http://localhost:8000"

# Color theme (dark, light)
theme = "dark"

# Seconds to wait for the backend to accept a connection
connect_timeout_secs = 10
"#
}
