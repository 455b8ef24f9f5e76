//! Configuration system for stimex.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{StimexError, StimexResult};
use crate::registry::TieBreak;

/// Main stimex configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimexConfig {
    /// Chunk size for batch-capable transformers (`None` = one chunk).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Converter names to try first, in order.
    pub converter_preference: Vec<String>,
    /// Ordering among converters not named in `converter_preference`.
    pub tie_break: TieBreak,
    /// Directory holding predefined dictionaries (`<name>.tsv`).
    pub dictionary_dir: PathBuf,
    /// Treat dictionary keys as case-sensitive.
    pub case_sensitive: bool,
    /// Default tracing filter directive.
    pub log_filter: String,
}

impl Default for StimexConfig {
    fn default() -> Self {
        let stimex_dir = dirs::home_dir()
            .map(|h| h.join(".stimex"))
            .unwrap_or_else(|| PathBuf::from(".stimex"));

        Self {
            batch_size: None,
            converter_preference: Vec::new(),
            tie_break: TieBreak::default(),
            dictionary_dir: stimex_dir.join("dictionaries"),
            case_sensitive: true,
            log_filter: "info".to_string(),
        }
    }
}

impl StimexConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> StimexResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| StimexError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| StimexError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| StimexError::Configuration(e.to_string())),
            _ => Err(StimexError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from `STIMEX_*` environment variables on top of
    /// the defaults. Unparseable values are reported, not ignored.
    pub fn from_env() -> StimexResult<Self> {
        let mut config = Self::default();

        if let Ok(size) = std::env::var("STIMEX_BATCH_SIZE") {
            let size: usize = size.parse().map_err(|_| {
                StimexError::Configuration(format!("STIMEX_BATCH_SIZE is not a number: {}", size))
            })?;
            config.batch_size = (size > 0).then_some(size);
        }
        if let Ok(pref) = std::env::var("STIMEX_CONVERTER_PREFERENCE") {
            config.converter_preference = pref
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Ok(tie) = std::env::var("STIMEX_TIE_BREAK") {
            config.tie_break = tie.parse().map_err(|_| {
                StimexError::Configuration(format!("Unknown STIMEX_TIE_BREAK: {}", tie))
            })?;
        }
        if let Ok(dir) = std::env::var("STIMEX_DICTIONARY_DIR") {
            config.dictionary_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("STIMEX_CASE_SENSITIVE") {
            config.case_sensitive = !matches!(flag.to_lowercase().as_str(), "0" | "false" | "no");
        }
        if let Ok(filter) = std::env::var("STIMEX_LOG") {
            config.log_filter = filter;
        }

        Ok(config)
    }

    /// Preference list as string slices.
    pub fn preference(&self) -> Vec<&str> {
        self.converter_preference.iter().map(String::as_str).collect()
    }
}
