//! Error types for mailsift.
//!
//! Every fallible operation in the crate returns [`Result`], whose error type
//! is [`MailsiftError`]. Serving-time failures (missing artifacts, an
//! unreachable embedder) are turned into an `Unclassified` outcome by the
//! pipeline; offline jobs propagate them and abort before publishing.
//!
//! # Examples
//!
//! ```
//! use mailsift::error::{MailsiftError, Result};
//!
//! fn check(expected: usize, actual: usize) -> Result<()> {
//!     if expected != actual {
//!         return Err(MailsiftError::DimensionMismatch { expected, actual });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(3, 4).is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for mailsift operations.
#[derive(Error, Debug)]
pub enum MailsiftError {
    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Analysis errors (tokenization, filtering)
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A feature or embedding vector does not match the expected dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A required artifact has not been published yet.
    #[error("Artifact missing: {0}")]
    ArtifactMissing(String),

    /// A stored artifact failed its integrity checks.
    #[error("Artifact corrupted: {0}")]
    ArtifactCorrupted(String),

    /// The embedding capability failed or timed out.
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The labeled corpus is missing, empty or malformed.
    #[error("Training data error: {0}")]
    TrainingData(String),

    /// Invalid configuration values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid arguments passed to an operation
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Binary serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with MailsiftError.
pub type Result<T> = std::result::Result<T, MailsiftError>;

impl MailsiftError {
    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        MailsiftError::Storage(msg.into())
    }

    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        MailsiftError::Analysis(msg.into())
    }

    /// Create a new artifact-missing error.
    pub fn artifact_missing<S: Into<String>>(name: S) -> Self {
        MailsiftError::ArtifactMissing(name.into())
    }

    /// Create a new artifact-corrupted error.
    pub fn artifact_corrupted<S: Into<String>>(msg: S) -> Self {
        MailsiftError::ArtifactCorrupted(msg.into())
    }

    /// Create a new embedding-unavailable error.
    pub fn embedding_unavailable<S: Into<String>>(msg: S) -> Self {
        MailsiftError::EmbeddingUnavailable(msg.into())
    }

    /// Create a new training data error.
    pub fn training_data<S: Into<String>>(msg: S) -> Self {
        MailsiftError::TrainingData(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        MailsiftError::InvalidConfig(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        MailsiftError::InvalidArgument(msg.into())
    }

    /// Create a new serialization error.
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        MailsiftError::Serialization(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        MailsiftError::Other(msg.into())
    }

    /// Create a new timeout error.
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        MailsiftError::EmbeddingUnavailable(format!("Timeout: {}", msg.into()))
    }

    /// Whether the error means "nothing has been published yet" rather than
    /// a genuine failure.
    pub fn is_missing_artifact(&self) -> bool {
        matches!(self, MailsiftError::ArtifactMissing(_))
    }
}

impl From<bincode::Error> for MailsiftError {
    fn from(err: bincode::Error) -> Self {
        MailsiftError::Serialization(err.to_string())
    }
}
