use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::diff::{DEFAULT_COLLAPSE_CONTEXT, DEFAULT_COLLAPSE_THRESHOLD};
use crate::error::{RadarError, Result};

const DEFAULT_CONFIG_FILENAME: &str = "config.toml";
pub const LOG_FILENAME: &str = "git-radar.log";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub default_remote: String,
    /// Commits shown in the graph view.
    pub log_limit: usize,
    pub debounce_ms: u64,
    pub alert_ms: u64,
    pub collapse_threshold: usize,
    pub collapse_context: usize,
    pub git_binary: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_remote: "origin".to_string(),
            log_limit: 100,
            debounce_ms: 200,
            alert_ms: 2000,
            collapse_threshold: DEFAULT_COLLAPSE_THRESHOLD,
            collapse_context: DEFAULT_COLLAPSE_CONTEXT,
            git_binary: "git".to_string(),
        }
    }
}

impl Config {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn alert_duration(&self) -> Duration {
        Duration::from_millis(self.alert_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.log_limit == 0 {
            return Err(RadarError::Config("log_limit must be at least 1".to_string()));
        }
        if self.default_remote.trim().is_empty() {
            return Err(RadarError::Config("default_remote must not be empty".to_string()));
        }
        if self.git_binary.trim().is_empty() {
            return Err(RadarError::Config("git_binary must not be empty".to_string()));
        }
        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "GitRadar", "git-radar")
        .ok_or_else(|| RadarError::Config("cannot resolve project directories".to_string()))
}

/// Where the dashboard writes its log file.
pub fn log_file_location() -> Result<PathBuf> {
    Ok(project_dirs()?.cache_dir().join(LOG_FILENAME))
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn default_location() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(DEFAULT_CONFIG_FILENAME))
    }

    pub fn default_store() -> Result<Self> {
        Ok(Self {
            path: Self::default_location()?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file yields the defaults.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|source| RadarError::io("reading config file", source))?;
        let config: Config = toml::from_str(&text).map_err(|e| {
            RadarError::Config(format!("invalid config {}: {e}", self.path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| RadarError::io("creating config directory", source))?;
        }
        let text = toml::to_string_pretty(config)
            .map_err(|e| RadarError::Config(format!("serialize config failed: {e}")))?;
        fs::write(&self.path, text).map_err(|source| RadarError::io("writing config file", source))
    }
}
