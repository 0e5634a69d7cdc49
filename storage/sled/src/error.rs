use sled::transaction::TransactionError;
use thiserror::Error;
use trellis_core::StoreError;

#[derive(Debug, Error)]
pub enum SledStoreError {
    #[error("storage error: {0}")]
    StorageError(#[from] sled::Error),
    #[error("bincode error: {0}")]
    BincodeError(#[from] bincode::Error),
    #[error("invalid key in tree {tree}: {reason}")]
    InvalidKey { tree: &'static str, reason: String },
    #[error("blocking task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

impl From<TransactionError<()>> for SledStoreError {
    fn from(err: TransactionError<()>) -> Self {
        match err {
            TransactionError::Storage(e) => SledStoreError::StorageError(e),
            TransactionError::Abort(()) => SledStoreError::StorageError(sled::Error::Unsupported("transaction aborted".into())),
        }
    }
}

impl From<SledStoreError> for StoreError {
    fn from(err: SledStoreError) -> Self {
        match err {
            // I/O may clear up; everything else means the data or the database is broken
            SledStoreError::StorageError(sled::Error::Io(_)) => StoreError::Transient(Box::new(err)),
            SledStoreError::BincodeError(e) => StoreError::Codec(e),
            other => StoreError::Fatal(Box::new(other)),
        }
    }
}
