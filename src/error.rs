//! Error types shared across the pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline errors
///
/// Component boundaries convert these into typed success/failure signals
/// (`false` or an empty collection); only the outermost `train`/`answer`
/// entry points guarantee that nothing propagates to the caller.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source file could not be opened or parsed at all
    #[error("failed to extract '{source_name}': {message}")]
    Extraction {
        source_name: String,
        message: String,
    },

    /// Embedding backend or storage failed to initialize
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    /// A deadline-bound operation ran past its budget
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },

    /// Input rejected before it reaches the pipeline
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Embedding backend call failed
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Generation backend call failed
    #[error("generation failed: {0}")]
    Generation(String),

    /// Index storage error
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (worker panic, join failure)
    #[error("internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create an extraction error
    pub fn extraction(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create an index-unavailable error
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable(message.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: &'static str, seconds: u64) -> Self {
        Self::Timeout { operation, seconds }
    }

    /// Create a malformed-input error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
