use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use ferngraph_common::constants::DEFAULT_CHECKPOINT_WAIT_TIMEOUT_IN_MICROS;
use ferngraph_transaction::{
    GraphTxnManager, Timestamp, TimestampGenerator, TransactionIdGenerator, TransactionState,
    TransactionType,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::checkpoint::CheckpointerFactory;
use super::transaction::Transaction;
use crate::common::wal::graph_wal::Operation;
use crate::context::StorageContext;
use crate::error::{AdmissionError, StorageError, StorageResult, TransactionError};
use crate::local_storage::{LocalStorage, LocalStorageConfig};

#[derive(Debug, Clone)]
pub struct TransactionManagerConfig {
    /// How long a checkpoint waits for active transactions to finish.
    pub checkpoint_wait_timeout: Duration,
    /// Reject a write transaction while another one is active.
    pub enforce_single_writer: bool,
    pub local_storage: LocalStorageConfig,
}

impl Default for TransactionManagerConfig {
    fn default() -> Self {
        Self {
            checkpoint_wait_timeout: Duration::from_micros(
                DEFAULT_CHECKPOINT_WAIT_TIMEOUT_IN_MICROS,
            ),
            enforce_single_writer: true,
            local_storage: LocalStorageConfig::default(),
        }
    }
}

impl TransactionManagerConfig {
    pub fn validate(&self) -> StorageResult<()> {
        self.local_storage.validate()
    }
}

#[derive(Debug, Default)]
struct ActiveTransactions {
    write: BTreeSet<Timestamp>,
    read_only: BTreeSet<Timestamp>,
}

impl ActiveTransactions {
    #[inline]
    fn is_empty(&self) -> bool {
        self.write.is_empty() && self.read_only.is_empty()
    }

    fn remove(&mut self, txn_id: Timestamp) -> bool {
        self.write.remove(&txn_id) || self.read_only.remove(&txn_id)
    }
}

/// Hands out transactions and serializes their commits, rollbacks and checkpoints.
///
/// Lock order is `admission` then `active`. Admission is held by `begin_transaction` and for
/// the whole of a checkpoint, so no transaction starts while a checkpoint drains. `active`
/// guards the active sets and is held across every commit, rollback and checkpoint run.
pub struct TransactionManager {
    context: Arc<StorageContext>,
    config: TransactionManagerConfig,
    txn_id_generator: TransactionIdGenerator,
    timestamp_generator: TimestampGenerator,
    admission: Mutex<()>,
    active: Mutex<ActiveTransactions>,
    drained: Condvar,
    draining: AtomicBool,
    checkpointer_factory: CheckpointerFactory,
    self_ref: Weak<TransactionManager>,
}

impl TransactionManager {
    pub fn new(
        context: Arc<StorageContext>,
        config: TransactionManagerConfig,
        checkpointer_factory: CheckpointerFactory,
    ) -> StorageResult<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new_cyclic(|self_ref| Self {
            context,
            config,
            txn_id_generator: TransactionIdGenerator::new(),
            timestamp_generator: TimestampGenerator::new(),
            admission: Mutex::new(()),
            active: Mutex::new(ActiveTransactions::default()),
            drained: Condvar::new(),
            draining: AtomicBool::new(false),
            checkpointer_factory,
            self_ref: self_ref.clone(),
        }))
    }

    #[inline]
    pub fn context(&self) -> &Arc<StorageContext> {
        &self.context
    }

    #[inline]
    pub fn config(&self) -> &TransactionManagerConfig {
        &self.config
    }

    /// Timestamp of the most recently admitted write transaction.
    #[inline]
    pub fn last_timestamp(&self) -> Timestamp {
        self.timestamp_generator.last()
    }

    pub fn begin_transaction(&self, txn_type: TransactionType) -> StorageResult<Transaction> {
        if self.draining.load(Ordering::Acquire) {
            return Err(AdmissionError::CheckpointInProgress.into());
        }
        let _admission = self.admission.lock();
        let mut active = self.active.lock();
        if txn_type == TransactionType::Write
            && self.config.enforce_single_writer
            && !active.write.is_empty()
        {
            return Err(AdmissionError::WriteTransactionActive.into());
        }

        let txn_id = self.txn_id_generator.next()?;
        let start_ts = match txn_type {
            TransactionType::Write => self.timestamp_generator.next()?,
            TransactionType::ReadOnly => self.timestamp_generator.last(),
        };
        match txn_type {
            TransactionType::Write => {
                self.context
                    .wal_manager()
                    .log(txn_id, Operation::BeginTransaction(start_ts))?;
                active.write.insert(txn_id);
            }
            TransactionType::ReadOnly => {
                active.read_only.insert(txn_id);
            }
        }
        info!(%txn_id, %start_ts, ?txn_type, "transaction started");

        let local_storage = LocalStorage::new(
            self.context.clone(),
            start_ts,
            self.config.local_storage.clone(),
        );
        Ok(Transaction::new(
            txn_id,
            start_ts,
            txn_type,
            local_storage,
            self.self_ref.clone(),
        ))
    }

    /// Publishes the staged writes of `txn`.
    ///
    /// On failure the transaction ends in [`TransactionState::Failed`]; tables committed before
    /// the failing one keep their rows, and the log records a rollback for the transaction.
    pub fn commit(&self, txn: &mut Transaction) -> StorageResult<()> {
        let mut active = self.active.lock();
        if !txn.is_active() {
            return Err(TransactionError::NotActive(txn.txn_id()).into());
        }
        let txn_id = txn.txn_id();
        let result = if txn.is_read_only() {
            Ok(())
        } else {
            self.commit_write(txn)
        };

        match &result {
            Ok(()) => {
                txn.set_state(TransactionState::Committed);
                info!(%txn_id, "transaction committed");
            }
            Err(e) => {
                self.log_rollback(txn_id);
                txn.local_storage().rollback();
                txn.set_state(TransactionState::Failed);
                warn!(%txn_id, error = %e, "transaction commit failed");
            }
        }
        self.finish(&mut active, txn_id);
        result
    }

    fn commit_write(&self, txn: &Transaction) -> StorageResult<()> {
        txn.local_storage().commit(txn)?;
        let wal = self.context.wal_manager();
        wal.log(txn.txn_id(), Operation::CommitTransaction(txn.start_ts()))?;
        wal.flush()
    }

    /// Discards the staged writes of `txn`. Rolling back a finished transaction is a no-op,
    /// except that a committed transaction cannot be rolled back.
    pub fn rollback(&self, txn: &mut Transaction) -> StorageResult<()> {
        let mut active = self.active.lock();
        match txn.state() {
            TransactionState::Active => {}
            TransactionState::RolledBack | TransactionState::Failed => return Ok(()),
            TransactionState::Committed => {
                return Err(TransactionError::NotActive(txn.txn_id()).into());
            }
        }
        let txn_id = txn.txn_id();
        txn.local_storage().rollback();
        if !txn.is_read_only() {
            self.log_rollback(txn_id);
        }
        txn.set_state(TransactionState::RolledBack);
        self.finish(&mut active, txn_id);
        info!(%txn_id, "transaction rolled back");
        Ok(())
    }

    fn log_rollback(&self, txn_id: Timestamp) {
        if let Err(e) = self
            .context
            .wal_manager()
            .log(txn_id, Operation::RollbackTransaction)
        {
            warn!(%txn_id, error = %e, "failed to log rollback");
        }
    }

    fn finish(&self, active: &mut MutexGuard<'_, ActiveTransactions>, txn_id: Timestamp) {
        if !active.remove(txn_id) {
            debug!(%txn_id, "finished transaction was not registered");
        }
        self.drained.notify_all();
    }

    /// Drains active transactions, then runs a checkpointer built by the factory.
    ///
    /// New transactions are rejected with [`AdmissionError::CheckpointInProgress`] meanwhile.
    /// If the transactions do not drain in time the checkpoint gives up with
    /// [`AdmissionError::CheckpointTimeout`] and leaves them running.
    pub fn checkpoint(&self) -> StorageResult<()> {
        let _admission = self.admission.lock();
        self.draining.store(true, Ordering::Release);
        let result = self.drain_and_checkpoint();
        self.draining.store(false, Ordering::Release);
        result
    }

    fn drain_and_checkpoint(&self) -> StorageResult<()> {
        let start = Instant::now();
        let mut active = self.active.lock();
        match start.checked_add(self.config.checkpoint_wait_timeout) {
            Some(deadline) => {
                self.drained
                    .wait_while_until(&mut active, |a| !a.is_empty(), deadline);
            }
            None => self.drained.wait_while(&mut active, |a| !a.is_empty()),
        }
        if !active.is_empty() {
            let waited = start.elapsed();
            warn!(
                ?waited,
                num_write = active.write.len(),
                num_read_only = active.read_only.len(),
                "checkpoint timed out waiting for transactions"
            );
            return Err(AdmissionError::CheckpointTimeout { waited }.into());
        }

        let mut checkpointer = (self.checkpointer_factory)(&self.context);
        checkpointer.run()?;
        info!(elapsed = ?start.elapsed(), "checkpoint finished");
        Ok(())
    }

    pub fn has_active_write_transactions(&self) -> bool {
        !self.active.lock().write.is_empty()
    }

    pub fn num_active_transactions(&self) -> usize {
        let active = self.active.lock();
        active.write.len() + active.read_only.len()
    }
}

impl GraphTxnManager for TransactionManager {
    type Error = StorageError;
    type Transaction = Transaction;

    fn begin_transaction(&self, txn_type: TransactionType) -> Result<Transaction, StorageError> {
        TransactionManager::begin_transaction(self, txn_type)
    }

    fn commit(&self, txn: &mut Transaction) -> Result<(), StorageError> {
        TransactionManager::commit(self, txn)
    }

    fn rollback(&self, txn: &mut Transaction) -> Result<(), StorageError> {
        TransactionManager::rollback(self, txn)
    }

    fn checkpoint(&self) -> Result<(), StorageError> {
        TransactionManager::checkpoint(self)
    }

    fn has_active_write_transactions(&self) -> bool {
        TransactionManager::has_active_write_transactions(self)
    }
}
