//! Transaction trait and related functionality

use serde::{Deserialize, Serialize};

use crate::timestamp::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionType {
    ReadOnly,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
    /// Commit failed part-way; the transaction must not be reused.
    Failed,
}

/// Trait defining the core operations that all transactions must support.
pub trait Transaction: Send + Sync {
    /// The error type for transaction operations
    type Error;

    /// Get the transaction ID
    fn txn_id(&self) -> Timestamp;

    /// Get the start timestamp of the transaction
    fn start_ts(&self) -> Timestamp;

    fn txn_type(&self) -> TransactionType;

    fn state(&self) -> TransactionState;

    #[inline]
    fn is_read_only(&self) -> bool {
        self.txn_type() == TransactionType::ReadOnly
    }

    #[inline]
    fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    /// Commit the transaction through its manager
    fn commit(&mut self) -> Result<(), Self::Error>;

    /// Roll back the transaction through its manager
    fn rollback(&mut self) -> Result<(), Self::Error>;
}
