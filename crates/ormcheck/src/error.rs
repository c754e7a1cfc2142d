//! Error types for ormcheck

use thiserror::Error;

/// Result type for ormcheck operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Error type for ormcheck operations.
///
/// Only [`CheckError::Configuration`] is allowed to escape a rule; everything
/// else is turned into a diagnostic or a silent skip before it reaches the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// Missing or broken wiring (no metadata store, unreadable mapping file).
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The metadata store contains an inconsistent mapping.
    #[error("Metadata error: {0}")]
    Metadata(String),
    /// A class was required to be mapped but is not.
    #[error("Class '{0}' is not a valid entity or mapped super class")]
    NotMapped(String),
    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Inference or other internal error.
    #[error("{0}")]
    Other(String),
}

impl CheckError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        CheckError::Configuration(message.into())
    }

    /// Create a metadata error.
    pub fn metadata(message: impl Into<String>) -> Self {
        CheckError::Metadata(message.into())
    }

    /// Check if this error must abort the whole analysis run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CheckError::Configuration(_))
    }
}
