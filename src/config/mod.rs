//! Configuration: TOML file for tunables, environment for credentials.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required credential is absent at startup. Fatal: the process does
    /// not start without it.
    #[error("{0} environment variable not set")]
    MissingCredential(&'static str),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub source: SourceConfig,
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub max_tokens: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Preferred transcript language for video sources.
    pub transcript_language: String,
    pub fetch_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            transcript_language: "pt".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Local append-only usage log, one count per line.
    pub local_path: String,
    pub remote: RemoteLedgerConfig,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            local_path: "token_usage.txt".to_string(),
            remote: RemoteLedgerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteLedgerConfig {
    pub enabled: bool,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub branch: Option<String>,
}

impl Default for RemoteLedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            owner: String::new(),
            repo: String::new(),
            path: "token_usage.txt".to_string(),
            branch: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location or fall back to defaults.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "docchat") {
            let config_dir = proj_dirs.config_dir();
            std::fs::create_dir_all(config_dir)?;
            Ok(config_dir.join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }
}

/// Credentials read from the environment at startup.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Completion-service API key.
    pub completion_api_key: String,
    /// Remote ledger store token, required only when the remote ledger is
    /// enabled in config.
    pub ledger_token: Option<String>,
}

impl Credentials {
    pub fn from_env(remote_ledger_enabled: bool) -> Result<Self, ConfigError> {
        let completion_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("OPENAI_API_KEY"))?;

        let ledger_token = std::env::var("GITHUB_TOKEN").ok();
        if remote_ledger_enabled && ledger_token.is_none() {
            return Err(ConfigError::MissingCredential("GITHUB_TOKEN"));
        }

        Ok(Self {
            completion_api_key,
            ledger_token,
        })
    }
}
