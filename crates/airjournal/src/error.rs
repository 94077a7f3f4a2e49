//! Error types for airjournal.
//!
//! This module defines the crate-level error taxonomy. Two variants matter to
//! callers of the journal core: [`Error::Validation`] (a draft was rejected
//! before any write) and [`Error::Write`] (the store refused a write).
//! Everything else comes from the storage engine, configuration or I/O.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// The write operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Creating a new record.
    Create,
    /// Patching an existing record.
    Update,
    /// Removing a record.
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// The main error type for airjournal operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Journal Errors ===
    /// A draft is missing a required field. No write was attempted.
    #[error("{field} is required")]
    Validation {
        /// Name of the first missing field.
        field: &'static str,
    },

    /// The store rejected a create, update or delete.
    #[error("failed to {operation} record in '{collection}': {source}")]
    Write {
        /// Which operation failed.
        operation: WriteOp,
        /// Collection the write targeted.
        collection: String,
        /// The adapter's reason.
        #[source]
        source: StoreError,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for airjournal operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for a missing field.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::Validation { field }
    }

    /// Wrap an adapter failure as a write error.
    #[must_use]
    pub fn write(operation: WriteOp, collection: impl Into<String>, source: StoreError) -> Self {
        Self::Write {
            operation,
            collection: collection.into(),
            source,
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error rejected a draft before any write.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a store write failure.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write { .. })
    }

    /// The missing field named by a validation error.
    #[must_use]
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            Self::Validation { field } => Some(*field),
            _ => None,
        }
    }
}
