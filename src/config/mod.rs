use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

const DEFAULT_MAX_PART_SIZE: u64 = 50 * 1024 * 1024;
const DEFAULT_MAX_TOTAL_SIZE: u64 = 2 * 1024 * 1024 * 1024;
const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bot_token: Option<String>,
    /// Base directory for per-request workspaces.
    pub temp_dir: PathBuf,
    /// Largest file sent in one message; anything bigger is split.
    pub max_part_size: u64,
    /// Hard cap on a single download. Over this, the request is rejected.
    pub max_total_size: u64,
    /// Buffer size for streaming file I/O.
    pub chunk_size: usize,
    pub download_timeout_secs: u64,
    pub logging: Logging,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub format: String,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bot_token: None,
            temp_dir: std::env::temp_dir().join("telegrab"),
            max_part_size: DEFAULT_MAX_PART_SIZE,
            max_total_size: DEFAULT_MAX_TOTAL_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            download_timeout_secs: DEFAULT_TIMEOUT_SECS,
            logging: Logging::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse config file {path}"))
    }

    /// Environment variables take precedence over the config file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(token) = std::env::var("BOT_TOKEN") {
            self.bot_token = Some(token);
        }
        if let Ok(dir) = std::env::var("TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
        override_number("MAX_FILE_SIZE", &mut self.max_part_size);
        override_number("MAX_TOTAL_SIZE", &mut self.max_total_size);
        override_number("CHUNK_SIZE", &mut self.chunk_size);
        self
    }

    pub fn bot_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .context("BOT_TOKEN is not set (environment variable or bot_token in the config file)")
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

fn override_number<T: FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring {}: {:?} is not a number", name, raw),
        }
    }
}
