//! Error types for the knowledge base.

use thiserror::Error;

/// Result type alias using KbError.
pub type Result<T> = std::result::Result<T, KbError>;

/// Errors that can occur while building or maintaining the knowledge base.
///
/// Only [`KbError::ArchiveLoad`] is fatal at startup. Embedding failures are
/// absorbed by the search path and by re-embedding.
#[derive(Error, Debug)]
pub enum KbError {
    /// An archive could not be read, decompressed or parsed.
    #[error("Failed to load archive {path}: {reason}")]
    ArchiveLoad { path: String, reason: String },

    /// Invalid argument provided.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Embedding capability failed or is unavailable.
    #[error("Embedding error: {message}")]
    Embedding { message: String },

    /// Ingestion error.
    #[error("Ingest error: {message}")]
    Ingest { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl KbError {
    /// Create an archive load error.
    pub fn archive_load(path: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::ArchiveLoad {
            path: path.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
        }
    }

    /// Create an ingest error.
    pub fn ingest(message: impl Into<String>) -> Self {
        Self::Ingest {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error must abort startup.
    pub fn is_fatal_load(&self) -> bool {
        matches!(self, Self::ArchiveLoad { .. })
    }

    /// Get a stable error code for tool responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ArchiveLoad { .. } => "ARCHIVE_LOAD_FAILED",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::Embedding { .. } => "EMBEDDING_UNAVAILABLE",
            Self::Ingest { .. } => "INGEST_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KbError::archive_load("kb/kb_store-000.json.gz", "invalid gzip header");
        let msg = err.to_string();
        assert!(msg.contains("kb_store-000.json.gz"));
        assert!(msg.contains("invalid gzip header"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            KbError::archive_load("x", "y").error_code(),
            "ARCHIVE_LOAD_FAILED"
        );
        assert_eq!(
            KbError::embedding("timed out").error_code(),
            "EMBEDDING_UNAVAILABLE"
        );
        assert_eq!(KbError::ingest("x").error_code(), "INGEST_ERROR");
        assert_eq!(KbError::config("x").error_code(), "CONFIG_ERROR");
        assert_eq!(
            KbError::invalid_argument("x").error_code(),
            "INVALID_ARGUMENT"
        );
    }

    #[test]
    fn test_only_archive_errors_are_fatal() {
        assert!(KbError::archive_load("x", "y").is_fatal_load());
        assert!(!KbError::embedding("down").is_fatal_load());
        assert!(!KbError::config("bad").is_fatal_load());
    }
}
