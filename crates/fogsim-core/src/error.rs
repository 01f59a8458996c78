//! Error types for fogsim

use std::path::PathBuf;
use thiserror::Error;

/// fogsim result type
pub type Result<T> = std::result::Result<T, FogsimError>;

/// Errors that abort a simulation run.
///
/// Expected-flow outcomes (no feasible node, queue overflow, a stale offer)
/// are not errors and never surface here.
#[derive(Error, Debug)]
pub enum FogsimError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Strategy selector not recognised
    #[error("Unknown strategy '{0}' (expected random, fully_random, heuristic, table-learning or table-learning-variant)")]
    UnknownStrategy(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Persisted decision table missing or unreadable
    #[error("Decision table for zone {zone} at {path}: {reason}")]
    DecisionTable {
        zone: String,
        path: PathBuf,
        reason: String,
    },

    /// Scenario (mobility/task trace) error
    #[error("Scenario error: {0}")]
    Scenario(String),
}

impl FogsimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a scenario error
    pub fn scenario(msg: impl Into<String>) -> Self {
        Self::Scenario(msg.into())
    }

    /// Create a decision table error
    pub fn decision_table(
        zone: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::DecisionTable {
            zone: zone.into(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
