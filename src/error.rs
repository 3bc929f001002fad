use crate::domain::validation::ValidationErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation failed: {0}")]
    ValidationError(ValidationErrors),
    #[error("Payment {0} not found")]
    NotFound(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Storage unavailable: {0}")]
    StorageError(String),
    #[error("Queue unavailable: {0}")]
    QueueError(String),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Status worker stopped: {0}")]
    WorkerStopped(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDbError(#[from] rocksdb::Error),
}

impl PaymentError {
    /// Store or queue failures the caller is expected to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StorageError(_) | Self::QueueError(_) => true,
            #[cfg(feature = "storage-rocksdb")]
            Self::RocksDbError(_) => true,
            _ => false,
        }
    }
}

impl From<ValidationErrors> for PaymentError {
    fn from(errors: ValidationErrors) -> Self {
        Self::ValidationError(errors)
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
