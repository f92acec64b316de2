//! Error types for testfleet

use thiserror::Error;
use tracing::warn;

/// Result type alias using the harness error
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Harness error types
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Resource query failed: {0}")]
    ResourceQuery(String),

    #[error("Subprocess failed: {command}: {stderr}")]
    Subprocess { command: String, stderr: String },

    #[error("Persistence failed for {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("Test suite not found: {0}")]
    SuiteNotFound(String),

    #[error("Invalid state transition for suite {suite}: {from} -> {to}")]
    InvalidStateTransition {
        suite: String,
        from: String,
        to: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// What a boundary does with an error of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Hand the error back to the caller.
    Propagate,
    /// Log it and keep going with whatever state we already have.
    LogAndContinue,
}

impl HarnessError {
    /// Policy table for harness errors.
    ///
    /// | kind                        | disposition      |
    /// |-----------------------------|------------------|
    /// | resource query              | log and continue |
    /// | subprocess (report, kill)   | log and continue |
    /// | persistence (registry/file) | log and continue |
    /// | io / walk                   | log and continue |
    /// | everything else             | propagate        |
    pub fn disposition(&self) -> Disposition {
        match self {
            HarnessError::ResourceQuery(_)
            | HarnessError::Subprocess { .. }
            | HarnessError::Persistence { .. }
            | HarnessError::Io(_)
            | HarnessError::Walk(_) => Disposition::LogAndContinue,
            _ => Disposition::Propagate,
        }
    }

    pub fn persistence(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        HarnessError::Persistence {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Apply the disposition policy to a result.
///
/// Recoverable errors are logged with `context` and turned into `Ok(None)`;
/// anything else is returned unchanged.
pub fn absorb<T>(result: Result<T>, context: &str) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.disposition() == Disposition::LogAndContinue => {
            warn!("{}: {}", context, e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
