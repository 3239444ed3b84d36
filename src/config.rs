use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::pr::github::DEFAULT_API_URL;
use crate::sync::{SyncMode, SyncOptions};

pub const CONFIG_FILE: &str = ".design-doc-sync.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .design-doc-sync.toml.
/// All fields are optional; the tool works with zero config inside a
/// GitHub Actions job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// How design doc sections are written into target PRs
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API base URL. If None, falls back to GITHUB_API_URL, then api.github.com.
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub mode: SyncMode,
    /// Heading written into target PRs; defaults per mode
    pub section_title: Option<String>,
    /// Heading read from the merged PR
    pub source_title: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or from .design-doc-sync.toml in the
    /// current directory when no path is given. A missing default file
    /// yields the default config; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::load_from(Path::new(CONFIG_FILE))?,
            None => Config::default(),
        };

        if config.github.token.is_none() {
            if let Ok(token) = std::env::var("GITHUB_TOKEN") {
                config.github.token = Some(token);
            }
        }

        Ok(config)
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }

    pub fn api_url(&self) -> String {
        self.github
            .api_url
            .clone()
            .or_else(|| std::env::var("GITHUB_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Sync options with command-line overrides applied on top of the file.
    pub fn sync_options(&self, mode: Option<SyncMode>, section_title: Option<String>) -> SyncOptions {
        let mode = mode.unwrap_or(self.sync.mode);
        let mut options = SyncOptions::new(mode, section_title.or_else(|| self.sync.section_title.clone()));
        if let Some(source) = &self.sync.source_title {
            options.source_title = source.clone();
        }
        options
    }
}
