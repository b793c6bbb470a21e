//! Error types for ckpt
//!
//! All modules use `CkptResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ckpt operations
pub type CkptResult<T> = Result<T, CkptError>;

/// All errors that can occur in ckpt
#[derive(Error, Debug)]
pub enum CkptError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    // Checkpoint errors
    #[error("Failed to read dependency {path}: {source}")]
    DependencyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checkpoint file not found: {0}")]
    CheckpointFileMissing(PathBuf),

    #[error("Predecessor of checkpoint '{0}' is no longer alive")]
    PredecessorDropped(String),

    // Experiment errors
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(String),

    #[error("Ambiguous experiment id '{id}' matches {} records", matches.len())]
    AmbiguousId { id: String, matches: Vec<String> },

    #[error("Experiment '{0}' mixes pre-computed metrics and raw results")]
    MixedOutcome(String),

    #[error("Result '{name}' has {truth} ground truth values but {predicted} predictions")]
    LengthMismatch {
        name: String,
        truth: usize,
        predicted: usize,
    },

    #[error("Experiment '{experiment}' has a non-finite value for '{key}'")]
    NonFiniteValue { experiment: String, key: String },

    // Report errors
    #[error("Flattened configuration key collides: {key}")]
    FlattenCollision { key: String },

    #[error("Unknown report column: {0}")]
    UnknownColumn(String),

    // Pipeline errors
    #[error("Unknown pipeline stage: {0}")]
    UnknownStage(String),

    #[error("Stage '{stage}' cannot {facet}")]
    MissingFacet { stage: String, facet: &'static str },

    #[error("Pipeline has no stages")]
    EmptyPipeline,

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    // General errors
    #[error("{0}")]
    User(String),
}

impl CkptError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a dependency read error
    pub fn dependency(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DependencyRead {
            path: path.into(),
            source,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ExperimentNotFound(_) => Some("Run: ckpt report to list stored experiments"),
            Self::AmbiguousId { .. } => Some("Use a longer id prefix"),
            Self::CheckpointFileMissing(_) => {
                Some("Check Checkpoint::exists() before restoring a stage")
            }
            Self::FlattenCollision { .. } => {
                Some("Rename the configuration key so nested paths stay distinct")
            }
            Self::ConfigInvalid { .. } => Some("Run: ckpt config show"),
            Self::NonFiniteValue { .. } => Some("Filter out NaN or infinite values before recording"),
            _ => None,
        }
    }
}
