//! Configuration file handling for dogclip.
//!
//! Loads configuration from `~/.config/dogclip/config.toml` or a custom path.
//! Credentials may also come from the environment (`KLING_ACCESS_KEY`,
//! `KLING_SECRET_KEY`, `GEMINI_API_KEY`, `DOGCLIP_ADMIN_PASSWORD`); the
//! config file takes precedence when both are present.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable for the Kling access key.
pub const KLING_ACCESS_KEY_ENV: &str = "KLING_ACCESS_KEY";

/// Environment variable for the Kling secret key.
pub const KLING_SECRET_KEY_ENV: &str = "KLING_SECRET_KEY";

/// Environment variable for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable for the shared admin password.
pub const ADMIN_PASSWORD_ENV: &str = "DOGCLIP_ADMIN_PASSWORD";

/// Configuration file structure for dogclip.
/// Loaded from ~/.config/dogclip/config.toml (or custom path via --config).
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub kling: KlingConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Kling credential pair used to sign bearer tokens.
#[derive(Debug, Deserialize, Default)]
pub struct KlingConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AuthConfig {
    pub admin_password: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Resolve the Kling access/secret key pair, falling back to the
    /// environment when the config file leaves them unset.
    pub fn kling_credentials(&self) -> Result<(String, String), ConfigError> {
        let access = self
            .kling
            .access_key
            .clone()
            .or_else(|| std::env::var(KLING_ACCESS_KEY_ENV).ok())
            .filter(|v| !v.is_empty());
        let secret = self
            .kling
            .secret_key
            .clone()
            .or_else(|| std::env::var(KLING_SECRET_KEY_ENV).ok())
            .filter(|v| !v.is_empty());

        match (access, secret) {
            (Some(access), Some(secret)) => Ok((access, secret)),
            _ => Err(ConfigError::MissingKlingCredentials),
        }
    }

    /// Resolve the Gemini API key, falling back to the environment.
    pub fn gemini_api_key(&self) -> Result<String, ConfigError> {
        self.gemini
            .api_key
            .clone()
            .or_else(|| std::env::var(GEMINI_API_KEY_ENV).ok())
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingGeminiApiKey)
    }

    /// Resolve the shared admin password gating generation, if configured.
    pub fn admin_password(&self) -> Option<String> {
        self.auth
            .admin_password
            .clone()
            .or_else(|| std::env::var(ADMIN_PASSWORD_ENV).ok())
            .filter(|v| !v.is_empty())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
    MissingKlingCredentials,
    MissingGeminiApiKey,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::MissingKlingCredentials => {
                write!(
                    f,
                    "Kling credentials not configured (set [kling] access_key/secret_key \
                     in config.toml or {KLING_ACCESS_KEY_ENV}/{KLING_SECRET_KEY_ENV})"
                )
            }
            ConfigError::MissingGeminiApiKey => {
                write!(
                    f,
                    "Gemini API key not configured (set [gemini] api_key in config.toml \
                     or {GEMINI_API_KEY_ENV})"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
            ConfigError::MissingKlingCredentials | ConfigError::MissingGeminiApiKey => None,
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("dogclip").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/dogclip/config.toml")
        })
}
