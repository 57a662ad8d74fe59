use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),

    #[error("Storage type error: {0}")]
    StorageTypeError(String),

    #[error("Allocation error: {0}")]
    AllocationError(String),

    #[error("Transaction state error: {0}")]
    TransactionStateError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, PersistError>;

impl PersistError {
    /// True for failures raised by the transaction boundary checks.
    pub fn is_transaction_state(&self) -> bool {
        matches!(self, Self::TransactionStateError(_))
    }
}

impl<T> From<std::sync::PoisonError<T>> for PersistError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
