//! Configuration module.
//!
//! Handles recorder limits and default naming-convention settings.

mod settings;

pub use settings::{
    DefaultRuleSettings, RecorderSettings, Settings, SettingsError, SettingsResult,
};
