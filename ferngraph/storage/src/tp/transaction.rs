use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use ferngraph_transaction::{Timestamp, TransactionState, TransactionType};
use tracing::warn;

use super::txn_manager::TransactionManager;
use crate::context::StorageContext;
use crate::error::{StorageError, StorageResult, TransactionError};
use crate::local_storage::LocalStorage;
use crate::local_storage::local_table::{
    LocalTable, LocalTableOps, TableDeleteState, TableInsertState, TableUpdateState,
};
use crate::table::Table;

/// Flags a running transaction as interrupted from another thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    #[inline]
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// A transaction handed out by [`TransactionManager::begin_transaction`].
///
/// Writes are staged in the transaction's [`LocalStorage`] and become visible to others only
/// when the manager commits them. Dropping an active transaction rolls it back.
pub struct Transaction {
    txn_id: Timestamp,
    start_ts: Timestamp,
    txn_type: TransactionType,
    state: TransactionState,
    local_storage: LocalStorage,
    interrupted: Arc<AtomicBool>,
    manager: Weak<TransactionManager>,
}

impl Transaction {
    pub(super) fn new(
        txn_id: Timestamp,
        start_ts: Timestamp,
        txn_type: TransactionType,
        local_storage: LocalStorage,
        manager: Weak<TransactionManager>,
    ) -> Self {
        Self {
            txn_id,
            start_ts,
            txn_type,
            state: TransactionState::Active,
            local_storage,
            interrupted: Arc::new(AtomicBool::new(false)),
            manager,
        }
    }

    #[inline]
    pub fn txn_id(&self) -> Timestamp {
        self.txn_id
    }

    #[inline]
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    #[inline]
    pub fn txn_type(&self) -> TransactionType {
        self.txn_type
    }

    #[inline]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        self.txn_type == TransactionType::ReadOnly
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    #[inline]
    pub(super) fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }

    #[inline]
    pub fn local_storage(&self) -> &LocalStorage {
        &self.local_storage
    }

    #[inline]
    pub fn context(&self) -> &Arc<StorageContext> {
        self.local_storage.context()
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interrupted.clone())
    }

    #[inline]
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Stages an insert into `table`. The assigned id is written back into `state`.
    pub fn insert(&self, table: &dyn Table, state: &mut TableInsertState) -> StorageResult<()> {
        self.writable_local_table(table)?.insert(state)
    }

    /// Updates a row staged by this transaction. Returns `false` when no staged row matches.
    pub fn update(&self, table: &dyn Table, state: &TableUpdateState) -> StorageResult<bool> {
        self.writable_local_table(table)?.update(state)
    }

    /// Deletes a row staged by this transaction. Returns `false` when no staged row matches.
    pub fn delete(&self, table: &dyn Table, state: &TableDeleteState) -> StorageResult<bool> {
        self.writable_local_table(table)?.delete(state)
    }

    fn writable_local_table(&self, table: &dyn Table) -> StorageResult<Arc<LocalTable>> {
        if self.state != TransactionState::Active {
            return Err(TransactionError::NotActive(self.txn_id).into());
        }
        if self.is_read_only() {
            return Err(TransactionError::ReadOnly(self.txn_id).into());
        }
        if self.is_interrupted() {
            return Err(TransactionError::Interrupted(self.txn_id).into());
        }
        self.local_storage.get_or_create_local_table(table)
    }

    fn manager(&self) -> StorageResult<Arc<TransactionManager>> {
        self.manager
            .upgrade()
            .ok_or(StorageError::Transaction(TransactionError::ManagerDropped))
    }

    pub fn commit(&mut self) -> StorageResult<()> {
        self.manager()?.commit(self)
    }

    pub fn rollback(&mut self) -> StorageResult<()> {
        self.manager()?.rollback(self)
    }
}

impl ferngraph_transaction::Transaction for Transaction {
    type Error = StorageError;

    fn txn_id(&self) -> Timestamp {
        self.txn_id
    }

    fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    fn txn_type(&self) -> TransactionType {
        self.txn_type
    }

    fn state(&self) -> TransactionState {
        self.state
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        self.manager()?.commit(self)
    }

    fn rollback(&mut self) -> Result<(), Self::Error> {
        self.manager()?.rollback(self)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state != TransactionState::Active {
            return;
        }
        let txn_id = self.txn_id;
        match self.manager.upgrade() {
            Some(manager) => {
                if let Err(e) = manager.rollback(self) {
                    warn!(%txn_id, error = %e, "rollback of dropped transaction failed");
                }
            }
            None => self.local_storage.rollback(),
        }
    }
}
