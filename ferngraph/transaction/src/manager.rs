//! Transaction manager trait.
//!
//! A manager is the only authority allowed to hand out transaction identities and
//! timestamps. It also serializes commit, rollback and checkpoint against each other.

use crate::transaction::{Transaction, TransactionType};

pub trait GraphTxnManager {
    /// The transaction type that this manager handles
    type Transaction: Transaction;
    /// The error type for operations
    type Error;

    /// Admits a new transaction and registers it as active.
    fn begin_transaction(
        &self,
        txn_type: TransactionType,
    ) -> Result<Self::Transaction, Self::Error>;

    /// Publishes the staged writes of `txn` and removes it from the active set.
    fn commit(&self, txn: &mut Self::Transaction) -> Result<(), Self::Error>;

    /// Discards the staged writes of `txn` and removes it from the active set.
    fn rollback(&self, txn: &mut Self::Transaction) -> Result<(), Self::Error>;

    /// Blocks admission, waits for active transactions to drain and persists the current state.
    fn checkpoint(&self) -> Result<(), Self::Error>;

    fn has_active_write_transactions(&self) -> bool;
}
