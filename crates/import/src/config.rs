use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Most sample rows ever sent to the oracle.
pub const MAX_ORACLE_SAMPLE_ROWS: usize = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Leading lines inspected when looking for the header row.
    pub header_scan_lines: usize,
    /// Characters of the first line inspected for the delimiter.
    pub delimiter_sample_chars: usize,
    pub oracle_sample_rows: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            header_scan_lines: 10,
            delimiter_sample_chars: 1000,
            oracle_sample_rows: MAX_ORACLE_SAMPLE_ROWS,
        }
    }
}

impl DetectionConfig {
    pub fn sample_rows(&self) -> usize {
        self.oracle_sample_rows.min(MAX_ORACLE_SAMPLE_ROWS)
    }
}

/// An OpenAI-compatible chat-completions endpoint used as the last
/// automatic mapping resort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub timeout_secs: u64,
    pub max_tokens: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            api_key_env: "PESO_ORACLE_API_KEY".to_string(),
            timeout_secs: 30,
            max_tokens: 600,
        }
    }
}

impl OracleConfig {
    /// The configured key, if the environment provides a non-blank one.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub detection: DetectionConfig,
    /// Absent means the oracle strategy is never attempted.
    pub oracle: Option<OracleConfig>,
}

impl ImportConfig {
    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
