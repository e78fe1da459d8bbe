//! Configuration management for promptbake
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.promptbake/config.toml

use crate::errors::{BakeError, Result};
use crate::generation::{builtin_templates, PromptTemplate, SessionPolicy};
use crate::streaming::{StreamFormat, DEFAULT_API_URL, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete configuration for promptbake
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Extra prompt templates; a name shared with a built-in replaces it
    pub templates: Vec<PromptTemplate>,

    pub api: ApiConfig,
    pub session: SessionConfig,
    pub storage: StorageConfig,
    pub identity: IdentityConfig,
    pub logging: LoggingConfig,
}

/// Generation endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,
    pub format: StreamFormat,
    pub connect_timeout_secs: u64,
}

/// Session behavior configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub persist_empty_results: bool,
    pub event_capacity: usize,
}

/// History storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub history_dir: String,
    pub max_records: usize,
}

/// Signed-in user used for saving history and favorites
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub owner_id: String,
    pub email: String,
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when RUST_LOG is unset
    pub filter: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            format: StreamFormat::default(),
            connect_timeout_secs: 10,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist_empty_results: true,
            event_capacity: crate::events::DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_dir: "~/.promptbake/history".to_string(),
            max_records: crate::store::file::DEFAULT_MAX_RECORDS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "promptbake=warn".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            Self::load_from_file(&config_path)
        } else {
            Self::load_default()
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BakeError::ConfigError(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| BakeError::ConfigError(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// Standard config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".promptbake").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(BakeError::ConfigError(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }

        if self.api.model.trim().is_empty() {
            return Err(BakeError::ConfigError("api.model must not be empty".to_string()));
        }

        if self.api.api_key_env.trim().is_empty() {
            return Err(BakeError::ConfigError(
                "api.api_key_env must name an environment variable".to_string(),
            ));
        }

        if self.api.connect_timeout_secs == 0 {
            return Err(BakeError::ConfigError(
                "api.connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.session.event_capacity == 0 {
            return Err(BakeError::ConfigError(
                "session.event_capacity must be greater than 0".to_string(),
            ));
        }

        if self.storage.max_records == 0 {
            return Err(BakeError::ConfigError(
                "storage.max_records must be greater than 0".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for template in &self.templates {
            template.validate().map_err(|e| {
                BakeError::ConfigError(format!("Invalid template '{}': {}", template.name, e))
            })?;
            if !names.insert(template.name.as_str()) {
                return Err(BakeError::ConfigError(format!(
                    "Duplicate template name: {}",
                    template.name
                )));
            }
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| BakeError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BakeError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| BakeError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Expand tilde in paths
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    /// Get history directory path
    pub fn history_dir(&self) -> PathBuf {
        Self::expand_path(&self.storage.history_dir)
    }

    /// API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            persist_empty_results: self.session.persist_empty_results,
        }
    }

    /// Built-in templates merged with the configured ones
    pub fn templates(&self) -> Vec<PromptTemplate> {
        let mut templates: Vec<PromptTemplate> = builtin_templates()
            .into_iter()
            .filter(|builtin| !self.templates.iter().any(|t| t.name == builtin.name))
            .collect();
        templates.extend(self.templates.iter().cloned());
        templates
    }
}
