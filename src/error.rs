//! Error types for volume operations

use crate::types::DataType;
use thiserror::Error;

/// Main error type for volume operations
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Unsupported store version: {0}")]
    UnsupportedVersion(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Decompression error: {0}")]
    Decompression(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Missing array: {0}")]
    MissingArray(String),

    #[error("Array {array} has type {found}, expected {expected}")]
    TypeMismatch {
        array: String,
        expected: DataType,
        found: DataType,
    },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Checksum mismatch for array {array}")]
    ChecksumMismatch { array: String },

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Specialized Result type for volume operations
pub type Result<T> = std::result::Result<T, VolumeError>;

impl From<serde_json::Error> for VolumeError {
    fn from(err: serde_json::Error) -> Self {
        VolumeError::Serialization(err.to_string())
    }
}
