//! TOML-based configuration for aggregate discovery.
//!
//! Example configuration:
//! ```toml
//! [recorder]
//! error_limit = 10
//!
//! [default_rules]
//! table_templates = ["agg_.+_${fact_name}"]
//! fact_count_column = "fact_count"
//! ignore_columns = ["load_.*"]
//! ignore_case = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::recorder::MessageRecorder;
use crate::rules::DefaultRules;

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub recorder: RecorderSettings,
    pub default_rules: DefaultRuleSettings,
}

/// Diagnostic recorder settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecorderSettings {
    /// Errors tolerated per star before discovery of that star aborts.
    pub error_limit: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            error_limit: MessageRecorder::DEFAULT_ERROR_LIMIT,
        }
    }
}

/// Naming conventions for default aggregate rules.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultRuleSettings {
    /// Table name templates; `${fact_name}` is replaced by the fact table name.
    pub table_templates: Vec<String>,

    /// Column holding the number of fact rows summarized by each row.
    pub fact_count_column: String,

    /// Column name patterns left unbound without a warning.
    pub ignore_columns: Vec<String>,

    /// Match table templates case-insensitively.
    pub ignore_case: bool,
}

impl Default for DefaultRuleSettings {
    fn default() -> Self {
        Self {
            table_templates: vec!["agg_.+_${fact_name}".to_string()],
            fact_count_column: "fact_count".to_string(),
            ignore_columns: Vec::new(),
            ignore_case: true,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file and validate them.
    pub fn load(path: impl AsRef<Path>) -> SettingsResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from a TOML string and validate them.
    pub fn from_toml_str(content: &str) -> SettingsResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> SettingsResult<()> {
        if self.recorder.error_limit == 0 {
            return Err(SettingsError::InvalidConfig(
                "recorder.error_limit must be at least 1".to_string(),
            ));
        }
        if self.default_rules.fact_count_column.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "default_rules.fact_count_column must not be empty".to_string(),
            ));
        }
        DefaultRules::from_settings(&self.default_rules).map(|_| ())
    }
}
