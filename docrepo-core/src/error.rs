//! Error types and result types for repository operations.
//!
//! Every fallible operation in the workspace returns [`RepositoryResult<T>`].
//! Nothing is retried internally; errors are handed back to the caller as-is.

use std::time::Duration;

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents all possible errors that can occur when talking to a document store
/// through a repository.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// The cluster could not be reached, the URI was rejected, or the connection
    /// handshake did not finish within the connect timeout.
    #[error("Connection error: {0}")]
    Connection(String),
    /// An object id string was not a 24 character hexadecimal value.
    #[error("Invalid object id: {0}")]
    InvalidIdFormat(String),
    /// A read matched no document.
    #[error("Document not found: {0}")]
    NotFound(String),
    /// The engine rejected a write because of a unique key violation.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),
    /// Any other failure reported by the storage engine.
    #[error("Storage error: {0}")]
    Storage(String),
    /// Serialization/deserialization error when converting between documents,
    /// typed models and JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// The input could not be used as a document, filter or update specification.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// Invalid connection or repository configuration.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The operation did not complete within the per-operation timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

/// A specialized `Result` type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument(message.into())
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a unique key violation.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, Self::DuplicateKey(_))
    }
}

impl From<BsonError> for RepositoryError {
    fn from(err: BsonError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for RepositoryError {
    fn from(err: SerdeJsonError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
