//! Error types for neostore
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Error kinds
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `MissingData` | a required metadata entry or dataset is absent at load time |
//! | `TypeMismatch` | a value fails its field's validation during store |
//! | `InvalidAppend` | append without an expandable axis, on a closed file, or with a bad chunk shape |
//! | `NotFound` | a loader or catalog cannot resolve an id |
//! | `StorageError` / `IoError` / `Corruption` / `IncompleteContainer` | the storage layer failed |
//! | `SchemaMismatch` | a container declares a field the entity does not have |
//! | `InvalidConfig` | `neostore.toml` cannot be read or parsed |
//!
//! Nothing in this crate retries. Every error propagates to the caller.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for neostore operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for neostore
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A metadata entry or dataset expected in storage is absent
    #[error("Missing data: '{name}' in group '{group}'")]
    MissingData {
        /// Metadata group ("" for the root side table)
        group: String,
        /// Entry or dataset name
        name: String,
    },

    /// A value was rejected by its field's attribute descriptor
    #[error("Type mismatch for field '{field}': {reason}")]
    TypeMismatch {
        /// Field being stored
        field: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Array shape does not fit the data or the requested operation
    #[error("Shape error: {0}")]
    ShapeError(String),

    /// Append attempted where it is not allowed
    #[error("Invalid append: {0}")]
    InvalidAppend(String),

    /// No file or catalog record matches the given id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Data corruption detected (checksum or framing)
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// The container has no seal record, so it was never closed by its writer
    #[error("Incomplete container (no seal record): {}", .0.display())]
    IncompleteContainer(PathBuf),

    /// Configuration file could not be read or parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The container declares a field the entity type does not have
    #[error("Schema mismatch: container '{container}' declares field '{field}' missing on the entity")]
    SchemaMismatch {
        /// Container format name
        container: String,
        /// Declared field name
        field: String,
    },
}

impl Error {
    /// Build a `MissingData` error
    pub fn missing(group: impl Into<String>, name: impl Into<String>) -> Self {
        Error::MissingData {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Build a `TypeMismatch` error
    pub fn type_mismatch(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::TypeMismatch {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a `SchemaMismatch` error
    pub fn schema_mismatch(container: impl Into<String>, field: impl Into<String>) -> Self {
        Error::SchemaMismatch {
            container: container.into(),
            field: field.into(),
        }
    }

    /// Check if this is a `MissingData` error
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Error::MissingData { .. })
    }

    /// Check if this is a `NotFound` error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this error originates in the storage layer
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Error::StorageError(_)
                | Error::IoError(_)
                | Error::Corruption(_)
                | Error::IncompleteContainer(_)
        )
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}
