//! Error types for relq

use thiserror::Error;

/// Result type alias for relq operations
pub type RelqResult<T> = Result<T, RelqError>;

/// Error types for query compilation and entity operations
#[derive(Debug, Error)]
pub enum RelqError {
    /// Expression shape the resolver does not recognize
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Member name has no matching descriptor column
    #[error("Column '{column}' not found on entity '{entity}'")]
    ColumnNotFound { entity: String, column: String },

    /// Key-dependent operation on a keyless entity
    #[error("Entity '{0}' has no usable primary key")]
    MissingPrimaryKey(String),

    /// Key value rejected before any SQL is built
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Zero rows affected on a write, or identity not retrievable
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Dialect lacks a requested capability
    #[error("{dialect} does not support {feature}")]
    NotSupported {
        dialect: &'static str,
        feature: String,
    },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Execution backend error
    #[error("Backend error: {0}")]
    Backend(String),
}

impl RelqError {
    /// Create an unsupported-expression error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedExpression(message.into())
    }

    /// Create a column-not-found error
    pub fn column_not_found(entity: impl Into<String>, column: impl Into<String>) -> Self {
        Self::ColumnNotFound {
            entity: entity.into(),
            column: column.into(),
        }
    }

    /// Create a not-supported error for a dialect capability
    pub fn not_supported(dialect: &'static str, feature: impl Into<String>) -> Self {
        Self::NotSupported {
            dialect,
            feature: feature.into(),
        }
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a not-supported error
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    /// Check if this is a write failure
    pub fn is_write_failed(&self) -> bool {
        matches!(self, Self::WriteFailed(_))
    }
}
