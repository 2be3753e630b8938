//! Error types for identifier collection.

use thiserror::Error;

/// Device-identifier errors.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Reading an identifier file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;
