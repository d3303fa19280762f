//! Error types for the vitals_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vitals_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A store operation was issued before `RecordStore::init` succeeded
    #[error("Record store is not initialized")]
    NotInitialized,

    /// The store directory or document could not be opened or provisioned
    #[error("Record store unavailable: {0}")]
    StorageUnavailable(String),

    /// Reading the record document failed
    #[error("Failed to read records: {0}")]
    StorageReadFailure(String),

    /// Writing the record document failed
    #[error("Failed to write records: {0}")]
    StorageWriteFailure(String),

    /// A reading was rejected before reaching storage
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
