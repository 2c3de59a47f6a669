//! Application configuration: a TOML file under the user config directory,
//! overlaid by `TEAMS_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration as StdDuration,
};

use anyhow::{Context, Result};
use chrono::Duration;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::ServerVersion;

const APP_DIR: &str = "teams";
const CONFIG_FILE: &str = "config.toml";

/// Longest disband confirmation window accepted, in seconds.
pub const MAX_DISBAND_CONFIRM_SECS: u64 = 3600;

const DEFAULT_CONFIG: &str = r#"# Teams configuration.
# Every key can be overridden with a TEAMS_<KEY> environment variable.

# Directory holding the team and alliance documents.
# Defaults to the platform data directory when left out.
# data_dir = "/var/lib/teams"

# File names inside data_dir. A .json extension switches the format to JSON.
teams_file = "teams.yml"
alliances_file = "alliances.yml"

# Seconds an owner has to confirm a disband request.
disband_confirm_secs = 30

# Version reported by the host; 1.16 and newer get RGB chat colors.
server_version = "1.20.4"

# Verbose logging.
debug_mode = false

# Save after every successful change.
autosave = true
"#;

/// Runtime settings shared by the library and the console.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the persisted documents.
    pub data_dir: PathBuf,
    /// Teams document name, relative to `data_dir`.
    pub teams_file: String,
    /// Alliances document name, relative to `data_dir`.
    pub alliances_file: String,
    /// Disband confirmation window in seconds.
    pub disband_confirm_secs: u64,
    /// Host version string, e.g. `1.20.4`.
    pub server_version: String,
    /// Lowers the default log filter to `debug`.
    pub debug_mode: bool,
    /// Save after every mutating command.
    pub autosave: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            teams_file: "teams.yml".to_string(),
            alliances_file: "alliances.yml".to_string(),
            disband_confirm_secs: 30,
            server_version: ServerVersion::default().to_string(),
            debug_mode: false,
            autosave: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Location of the configuration file, if the platform has a config directory.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

/// Write the commented default configuration when none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let Some(path) = config_path() else {
        warn!("No config directory on this platform, using built-in defaults");
        return Ok(());
    };
    write_default_config(&path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!("Wrote default configuration to {}", path.display());
    Ok(())
}

impl AppConfig {
    /// Load from the default config file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path().as_deref())
    }

    /// Load from an explicit file (optional) plus environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }
        let settings = builder
            .add_source(Environment::with_prefix("TEAMS").try_parsing(true))
            .build()
            .context("failed to assemble configuration")?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.server_version()
            .with_context(|| format!("invalid server_version '{}'", self.server_version))?;
        if !(1..=MAX_DISBAND_CONFIRM_SECS).contains(&self.disband_confirm_secs) {
            anyhow::bail!(
                "disband_confirm_secs must be between 1 and {MAX_DISBAND_CONFIRM_SECS}, got {}",
                self.disband_confirm_secs
            );
        }
        self.disband_window()?;
        Ok(())
    }

    /// Full path of the teams document.
    pub fn teams_path(&self) -> PathBuf {
        self.data_dir.join(&self.teams_file)
    }

    /// Full path of the alliances document.
    pub fn alliances_path(&self) -> PathBuf {
        self.data_dir.join(&self.alliances_file)
    }

    /// Parsed host version.
    pub fn server_version(&self) -> Result<ServerVersion> {
        Ok(self.server_version.parse::<ServerVersion>()?)
    }

    /// Disband confirmation window.
    pub fn disband_window(&self) -> Result<Duration> {
        Duration::from_std(StdDuration::from_secs(self.disband_confirm_secs))
            .with_context(|| format!("disband_confirm_secs {} is out of range", self.disband_confirm_secs))
    }
}
