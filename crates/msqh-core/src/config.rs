use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MsqhError, MsqhResult};

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MsqhConfig {
    pub log: LogConfig,
    pub answers: AnswersConfig,
    pub encrypt: EncryptConfig,
    pub decrypt: DecryptConfig,
}

impl MsqhConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> MsqhResult<Self> {
        if !path.exists() {
            tracing::debug!("config file not found: {} (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| MsqhError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: warn)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// How answers are read from the terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerInput {
    /// Echo disabled, like a password prompt
    #[default]
    Hidden,
    /// Echo enabled; needed for IME / wide-character input
    Visible,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswersConfig {
    pub input: AnswerInput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptConfig {
    /// Extension appended to the input stem (default: msqh)
    pub extension: String,
    /// Refuse thresholds producing more derived keys than this
    pub max_combinations: u64,
    /// Ask before overwriting an existing output file
    pub confirm_overwrite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptConfig {
    /// Prefix prepended to the stored filename (default: "[decrypted]")
    pub output_prefix: String,
    /// Build the candidate table on a rayon pool
    pub parallel: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
            format: "text".into(),
        }
    }
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self {
            extension: "msqh".into(),
            max_combinations: 1 << 20,
            confirm_overwrite: true,
        }
    }
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            output_prefix: "[decrypted]".into(),
            parallel: false,
        }
    }
}
