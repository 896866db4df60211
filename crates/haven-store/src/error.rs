//! Error types for the storage layer.

use thiserror::Error;

/// A result type using `StoreError`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record was not found.
    #[error("record not found")]
    NotFound,

    /// A database error occurred.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The namespace was not registered when the store was opened.
    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    /// The namespace declares no index with this name.
    #[error("unknown index {index} on namespace {namespace}")]
    UnknownIndex {
        /// Namespace being queried.
        namespace: &'static str,
        /// Requested index name.
        index: String,
    },

    /// The item has no usable primary key.
    #[error("item in {namespace} is missing its key attribute {attribute}")]
    MissingKey {
        /// Namespace of the item.
        namespace: &'static str,
        /// Name of the key attribute.
        attribute: &'static str,
    },

    /// A guarded write lost: the unique claim is held by another live item.
    #[error("unique claim {claim} is held by {holder}")]
    ConditionFailed {
        /// The contested claim.
        claim: String,
        /// Key of the item currently holding it.
        holder: String,
    },
}

impl StoreError {
    pub(crate) fn db(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}
