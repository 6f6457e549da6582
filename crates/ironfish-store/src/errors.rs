use thiserror::Error;

// STORE ERROR
// ================================================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key {key} not found in store {store}")]
    NotFound { store: &'static str, key: String },
    #[error("store {store} holds a value that does not decode: {reason}")]
    Corrupt { store: &'static str, reason: String },
    #[error("key in store {store} does not decode: {reason}")]
    CorruptKey { store: &'static str, reason: String },
    #[error("database version {stored} is newer than the supported version {supported}")]
    VersionMismatch { stored: u32, supported: u32 },
    #[error("migration {id} declared out of order after {previous}")]
    MigrationOutOfOrder { id: u32, previous: u32 },
    #[error("transaction failed to commit")]
    TxAborted(#[source] redb::CommitError),
    #[error("storage backend error")]
    Backend(#[from] redb::Error),
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Backend(err.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Backend(err.into())
    }
}
