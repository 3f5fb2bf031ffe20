use std::time::Duration;

use ferngraph_catalog::error::CatalogError;
use ferngraph_common::types::TableId;
use ferngraph_transaction::{Timestamp, TimestampError};
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// A broken internal invariant. Never recovered in place.
    #[error("Consistency violation: {0}")]
    ConsistencyViolation(String),
    #[error("Staging buffer of table {table_id} exhausted at {capacity} rows")]
    ResourceExhaustion { table_id: TableId, capacity: u64 },
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),
    #[error("Commit of table {table_id} failed: {source}")]
    PartialCommit {
        table_id: TableId,
        #[source]
        source: Box<StorageError>,
    },
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Timestamp error: {0}")]
    Timestamp(#[from] TimestampError),
    #[error("WAL error: {0}")]
    Wal(#[from] WalError),
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("Table {0} not found")]
    TableNotFound(TableId),
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Configuration rejected: {0}")]
    ConfigurationRejection(String),
}

#[derive(Error, Debug)]
pub enum AdmissionError {
    #[error("a checkpoint is draining active transactions")]
    CheckpointInProgress,
    #[error("active transactions did not drain within {waited:?}")]
    CheckpointTimeout { waited: Duration },
    #[error("another write transaction is active")]
    WriteTransactionActive,
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is not active")]
    NotActive(Timestamp),
    #[error("Transaction {0} is read-only")]
    ReadOnly(Timestamp),
    #[error("Transaction {0} was interrupted")]
    Interrupted(Timestamp),
    #[error("Transaction manager has been dropped")]
    ManagerDropped,
}

#[derive(Error, Debug)]
pub enum WalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
    #[error("Checksum mismatch")]
    ChecksumMismatch,
    #[error("Invalid checkpoint format: {0}")]
    InvalidFormat(String),
}

impl StorageError {
    /// Unwraps a [`StorageError::PartialCommit`] down to the failure that caused it.
    pub fn root_cause(&self) -> &StorageError {
        match self {
            StorageError::PartialCommit { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
