use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TxError {
    #[error("Illegal transaction state: {0}")]
    IllegalState(String),

    #[error("Transaction silently rolled back because it has been marked as rollback-only")]
    UnexpectedRollback,

    #[error("No connection available within {0:?}")]
    NoResourceAvailable(Duration),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, TxError>;

impl<T> From<std::sync::PoisonError<T>> for TxError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
