use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

// ─── Top-level config ────────────────────────────────────────────────────────

/// Runtime configuration.
///
/// Loaded once at startup from an optional `versecraft.toml` in the platform
/// config directory, then overlaid with environment variables:
///
/// - `OPENAI_API_KEY` (required) — provider credential
/// - `DATABASE_URL` (optional) — hosted Postgres; absent selects the
///   embedded SQLite backend
/// - `VERSECRAFT_DATA_DIR` (optional) — where the SQLite file lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider credential - env only, never serialized back out.
    #[serde(skip)]
    pub api_key: Option<String>,

    /// Hosted database connection string. `None` selects SQLite.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Directory holding the embedded database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Identifier scoping people and ratings. Single-user installs keep
    /// the default.
    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub reliability: ReliabilityConfig,
}

// ─── Model parameters ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model")]
    pub name: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            temperature: default_temperature(),
            top_p: default_top_p(),
        }
    }
}

// ─── Reliability ─────────────────────────────────────────────────────────────

/// Provider-call reliability knobs.
///
/// Retry policy is deliberately single-attempt today; `max_attempts` exists
/// so the cap can be raised without changing the call sites.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.9
}

fn default_top_p() -> f64 {
    0.95
}

fn default_max_attempts() -> u32 {
    1
}

fn default_user_id() -> String {
    "local".to_string()
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "versecraft")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("data"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            database_url: None,
            data_dir: default_data_dir(),
            user_id: default_user_id(),
            model: ModelConfig::default(),
            reliability: ReliabilityConfig::default(),
        }
    }
}

impl Config {
    /// Load config: optional TOML file, then environment overlay, then
    /// validation. Missing `OPENAI_API_KEY` is a validation failure.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(&path)?;
                toml::from_str(&raw)
                    .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?
            }
            _ => Self::default(),
        };
        config.overlay_env();
        config.validate()?;
        Ok(config)
    }

    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "versecraft")
            .map(|dirs| dirs.config_dir().join("versecraft.toml"))
    }

    fn overlay_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database_url = Some(url);
            }
        }
        if let Ok(dir) = std::env::var("VERSECRAFT_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::Validation(
                "missing OPENAI_API_KEY (set it in the environment)".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Validation(format!(
                "temperature {} out of range 0..=2",
                self.model.temperature
            )));
        }
        if !(0.0..=1.0).contains(&self.model.top_p) {
            return Err(ConfigError::Validation(format!(
                "top_p {} out of range 0..=1",
                self.model.top_p
            )));
        }
        if self.reliability.max_attempts != 1 {
            // Single attempt only until a retry policy is decided.
            return Err(ConfigError::Validation(
                "reliability.max_attempts must be 1".into(),
            ));
        }
        Ok(())
    }
}
