//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::store::Codec;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub shell: ShellConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Index store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Codec for segments written by the session: "binary" or "text"
    #[serde(default = "default_codec")]
    pub codec: String,

    #[serde(default = "default_max_buffered_docs")]
    pub max_buffered_docs: usize,
}

fn default_codec() -> String {
    "binary".to_string()
}

fn default_max_buffered_docs() -> usize {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            max_buffered_docs: default_max_buffered_docs(),
        }
    }
}

impl StoreConfig {
    pub fn codec(&self) -> Result<Codec, ConfigError> {
        self.codec.parse().map_err(|_| ConfigError::Invalid {
            key: "store.codec".to_string(),
            value: self.codec.clone(),
        })
    }
}

/// How term bytes are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermDisplay {
    #[default]
    Utf8,
    Raw,
}

/// Interactive shell configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    pub history_file: Option<String>,

    #[serde(default)]
    pub term_display: TermDisplay,
}

fn default_read_only() -> bool {
    true
}

fn default_prompt() -> String {
    "> ".to_string()
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            read_only: default_read_only(),
            prompt: default_prompt(),
            history_file: None,
            term_display: TermDisplay::default(),
        }
    }
}

impl ShellConfig {
    /// Configured history file, else `~/.segscope_history`
    pub fn history_path(&self) -> Option<PathBuf> {
        match &self.history_file {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::home_dir().map(|home| home.join(".segscope_history")),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        let config: Config = toml::from_str(content).map_err(|e| e.to_string())?;
        config.store.codec().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("segscope").join("config.toml")),
            Some(PathBuf::from("/etc/segscope/config.toml")),
            Some(PathBuf::from("./segscope.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(codec) = lookup("SEGSCOPE_CODEC") {
            if codec.parse::<Codec>().is_ok() {
                self.store.codec = codec;
            } else {
                tracing::warn!("Ignoring invalid SEGSCOPE_CODEC={}", codec);
            }
        }
        if let Some(read_only) = lookup("SEGSCOPE_READ_ONLY") {
            if let Ok(v) = read_only.parse() {
                self.shell.read_only = v;
            }
        }
        if let Some(level) = lookup("SEGSCOPE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SEGSCOPE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# segscope Configuration
#
# Environment variables override these settings:
# - SEGSCOPE_CODEC
# - SEGSCOPE_READ_ONLY
# - SEGSCOPE_LOG_LEVEL
# - SEGSCOPE_LOG_FORMAT

[store]
# Codec for segments written by the shell: binary or text
codec = "binary"

# Documents buffered in memory before a segment is flushed
max_buffered_docs = 10000

[shell]
# Open indexes read-only; toggle with the `readonly` command
read_only = true

# Prompt shown by the interactive shell
prompt = "> "

# Command history file (default ~/.segscope_history)
# history_file = "/home/me/.segscope_history"

# How terms are printed: utf8 or raw (hex bytes)
term_display = "utf8"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/segscope/segscope.log"
"#
    .to_string()
}
