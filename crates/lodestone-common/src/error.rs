//! Error types for lodestone

use thiserror::Error;

/// Result type alias for lodestone operations
pub type Result<T> = std::result::Result<T, LodestoneError>;

/// Unified error type for all lodestone operations
#[derive(Error, Debug, Clone)]
pub enum LodestoneError {
    #[error("MongoDB error: {0}")]
    MongoDB(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// Invalid binding of a model to a collection, reported before any I/O
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A populate field has no relation declared on the model
    #[error("field not found: '{field}' is not a declared relation of {model}")]
    FieldNotFound { model: String, field: String },

    /// A single-document lookup matched nothing
    #[error("no document matched the filter")]
    NotFound,

    /// The operation context deadline elapsed
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The operation context was cancelled
    #[error("operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LodestoneError {
    /// Returns true if the error was raised by the operation context
    /// rather than by the server
    pub fn is_interrupted(&self) -> bool {
        matches!(self, LodestoneError::Timeout(_) | LodestoneError::Cancelled)
    }

    /// Returns true if this is a missing populate relation
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, LodestoneError::FieldNotFound { .. })
    }
}

impl From<serde_json::Error> for LodestoneError {
    fn from(err: serde_json::Error) -> Self {
        LodestoneError::Serialization(err.to_string())
    }
}

// MongoDB-specific error conversions (when mongodb-errors feature is enabled)
#[cfg(feature = "mongodb-errors")]
impl From<mongodb::error::Error> for LodestoneError {
    fn from(err: mongodb::error::Error) -> Self {
        LodestoneError::MongoDB(err.to_string())
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::ser::Error> for LodestoneError {
    fn from(err: bson::ser::Error) -> Self {
        LodestoneError::Serialization(format!("BSON serialization error: {}", err))
    }
}

#[cfg(feature = "mongodb-errors")]
impl From<bson::de::Error> for LodestoneError {
    fn from(err: bson::de::Error) -> Self {
        LodestoneError::Deserialization(format!("BSON deserialization error: {}", err))
    }
}
