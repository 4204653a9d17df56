//! Error types for session record storage.

use std::path::PathBuf;

use thiserror::Error;

use super::AssessmentSession;

/// Errors that can occur during record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An active record already exists for this (assessment, user) pair.
    ///
    /// Carries the winning record so the caller can resume it without a
    /// second read racing the rejection.
    #[error("active session already exists: {}", existing.id)]
    AlreadyActive { existing: Box<AssessmentSession> },

    /// I/O error during file operations.
    #[error("I/O error at {path}: {source}")]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error deserializing file contents.
    #[error("deserialization error at {path}: {message}")]
    FileDeserialization { path: PathBuf, message: String },

    /// Error serializing data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("session not found: {0}")]
    NotFound(String),
}

impl StoreError {
    /// Create an active-conflict error carrying the existing record.
    pub fn already_active(existing: AssessmentSession) -> Self {
        Self::AlreadyActive {
            existing: Box::new(existing),
        }
    }

    /// Create a file I/O error with path context.
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Create a file deserialization error with path context.
    pub fn file_deserialization(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::FileDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a not found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }
}

/// Convenience type alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
