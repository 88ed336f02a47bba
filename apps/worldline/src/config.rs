//! # Configuration
//!
//! Settings are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. `worldline.toml` (or the file passed with `--config`)
//! 3. `WORLDLINE_*` environment variables
//! 4. CLI flags (applied by `cli::execute`)
//!
//! API security knobs (`WORLDLINE_API_KEY`, `WORLDLINE_RATE_LIMIT`,
//! `WORLDLINE_CORS_ORIGINS`) are read by the `api` module itself.
//!
//! ```toml
//! store = "world.wldx"
//! backend = "redb"
//! autosave = true
//! log_limit = 20
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! ```

use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use worldline_core::WorldlineError;
use worldline_core::command::DEFAULT_LOG_LIMIT;

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "worldline.toml";

/// Maximum config file size (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

/// Where save data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A single canonical export file.
    #[default]
    File,
    /// A redb database, falling back to a canonical file on error.
    Redb,
}

impl FromStr for Backend {
    type Err = WorldlineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Backend::File),
            "redb" => Ok(Backend::Redb),
            other => Err(WorldlineError::InvalidConfig(format!(
                "Unknown backend '{}'. Use: file, redb",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::File => f.write_str("file"),
            Backend::Redb => f.write_str("redb"),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Save location. For redb this is the database file.
    pub store: PathBuf,
    pub backend: Backend,
    /// Save after every mutating command in the REPL and API.
    pub autosave: bool,
    /// Entries printed by `git log`.
    pub log_limit: usize,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: PathBuf::from("worldline.wldx"),
            backend: Backend::File,
            autosave: true,
            log_limit: DEFAULT_LOG_LIMIT,
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Load file settings, then apply the process environment.
    ///
    /// An explicit `path` must exist. Without one, a missing
    /// `worldline.toml` just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, WorldlineError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, WorldlineError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            WorldlineError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(WorldlineError::InvalidConfig(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            WorldlineError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let settings = Self::from_toml(&text).map_err(|e| match e {
            WorldlineError::InvalidConfig(reason) => {
                WorldlineError::InvalidConfig(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, WorldlineError> {
        toml::from_str(text).map_err(|e| WorldlineError::InvalidConfig(e.to_string()))
    }

    /// Override fields from `WORLDLINE_*` variables looked up through `var`.
    pub fn apply_env<F>(&mut self, var: F) -> Result<(), WorldlineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(store) = var("WORLDLINE_STORE").filter(|s| !s.is_empty()) {
            self.store = PathBuf::from(store);
        }
        if let Some(backend) = var("WORLDLINE_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(autosave) = var("WORLDLINE_AUTOSAVE") {
            self.autosave = !matches!(autosave.trim(), "0" | "false" | "off" | "no");
        }
        if let Some(host) = var("WORLDLINE_HOST").filter(|s| !s.is_empty()) {
            self.server.host = host;
        }
        if let Some(port) = var("WORLDLINE_PORT") {
            self.server.port = port.trim().parse().map_err(|_| {
                WorldlineError::InvalidConfig(format!("Invalid WORLDLINE_PORT '{}'", port))
            })?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
