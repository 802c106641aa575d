use thiserror::Error;

/// Failures of the state store. Every variant is a fatal condition for the
/// consensus layer: a missing mandatory field or an unreadable backend means
/// the node's view of the chain can no longer be trusted.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("mandatory state field missing: {0}")]
    MissingField(&'static str),

    #[error("validator index {0} out of bounds")]
    UnknownValidator(u64),

    #[error("ssz decode failed for {field}: {reason}")]
    Decode {
        field: &'static str,
        reason: String,
    },

    #[error("value exceeds list capacity for {0}")]
    Capacity(&'static str),

    #[error("redb error: {0}")]
    Redb(#[from] Box<redb::Error>),

    #[error("io error in creating DB file: {0}")]
    Io(#[from] std::io::Error),
}

impl From<redb::Error> for StoreError {
    fn from(err: redb::Error) -> Self {
        StoreError::Redb(Box::new(err))
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Redb(Box::new(err.into()))
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Redb(Box::new(err.into()))
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Redb(Box::new(err.into()))
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Redb(Box::new(err.into()))
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Redb(Box::new(err.into()))
    }
}
