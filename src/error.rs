//! Top-level error type for aggregate discovery.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::SettingsError;
use crate::navigator::DiscoveryReport;
use crate::recorder::{Message, RecorderError};

/// Result type for discovery operations.
pub type AggResult<T> = Result<T, AggError>;

/// Errors that end a discovery run.
#[derive(Error, Debug)]
pub enum AggError {
    /// The recorder's error ceiling was hit while discovering one star.
    #[error("aggregate discovery aborted for star '{star}': {source}")]
    Aborted {
        star: String,
        #[source]
        source: RecorderError,
        /// Everything recorded for the star before the abort.
        messages: Vec<Message>,
    },

    /// Discovery finished but recorded errors. Aggregates accepted before
    /// the errors stay registered.
    #[error("aggregate loading failed with {errors} error(s)")]
    LoadFailed {
        errors: usize,
        report: DiscoveryReport,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl AggError {
    /// Number of recorded errors behind this failure, when known.
    pub fn error_count(&self) -> Option<usize> {
        match self {
            AggError::Aborted {
                source: RecorderError::LimitExceeded { count, .. },
                ..
            } => Some(*count),
            AggError::LoadFailed { errors, .. } => Some(*errors),
            _ => None,
        }
    }
}
