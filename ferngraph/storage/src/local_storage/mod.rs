pub mod csr_index;
pub mod local_node_table;
pub mod local_rel_table;
pub mod local_table;

use std::collections::HashMap;
use std::sync::Arc;

use ferngraph_common::types::{TableId, TableType};
use ferngraph_transaction::Timestamp;
use parking_lot::RwLock;
use tracing::debug;

use self::local_node_table::LocalNodeTable;
use self::local_rel_table::LocalRelTable;
use self::local_table::{LocalTable, LocalTableOps};
use crate::common::wal::graph_wal::Operation;
use crate::context::StorageContext;
use crate::error::{StorageError, StorageResult};
use crate::table::Table;
use crate::tp::transaction::Transaction;

/// Maximum number of rows a single local table may stage.
pub const DEFAULT_STAGING_ROW_CAPACITY: u64 = 1 << 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStorageConfig {
    pub staging_row_capacity: u64,
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            staging_row_capacity: DEFAULT_STAGING_ROW_CAPACITY,
        }
    }
}

impl LocalStorageConfig {
    pub fn validate(&self) -> StorageResult<()> {
        if self.staging_row_capacity == 0 {
            return Err(StorageError::ConfigurationRejection(
                "staging_row_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Uncommitted writes of one transaction, one local table per touched durable table.
///
/// The map lock is never held while a local table's own lock is taken, and local tables are
/// never removed before the transaction ends.
pub struct LocalStorage {
    context: Arc<StorageContext>,
    read_ts: Timestamp,
    config: LocalStorageConfig,
    tables: RwLock<HashMap<TableId, Arc<LocalTable>>>,
}

impl LocalStorage {
    pub fn new(
        context: Arc<StorageContext>,
        read_ts: Timestamp,
        config: LocalStorageConfig,
    ) -> Self {
        Self {
            context,
            read_ts,
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn context(&self) -> &Arc<StorageContext> {
        &self.context
    }

    /// Returns the local table staging writes for `table`, creating it on first use.
    ///
    /// Concurrent callers for the same table all receive the same instance.
    pub fn get_or_create_local_table(&self, table: &dyn Table) -> StorageResult<Arc<LocalTable>> {
        let table_id = table.table_id();
        if let Some(local) = self.tables.read().get(&table_id) {
            return Ok(local.clone());
        }

        let mut tables = self.tables.write();
        if let Some(local) = tables.get(&table_id) {
            return Ok(local.clone());
        }
        let entry = self
            .context
            .catalog()
            .get_table_catalog_entry(self.read_ts, table.catalog_entry_id())?;
        let capacity = self.config.staging_row_capacity;
        let local = Arc::new(match table.table_type() {
            TableType::Node => {
                LocalTable::Node(LocalNodeTable::new(&entry, table.num_rows(), capacity))
            }
            TableType::Rel => LocalTable::Rel(LocalRelTable::new(table_id, &entry, capacity)),
        });
        debug!(table_id, table_type = ?table.table_type(), "created local table");
        tables.insert(table_id, local.clone());
        Ok(local)
    }

    #[inline]
    pub fn get_local_table(&self, table_id: TableId) -> Option<Arc<LocalTable>> {
        self.tables.read().get(&table_id).cloned()
    }

    pub fn num_tables(&self) -> usize {
        self.tables.read().len()
    }

    /// True when no local table stages any row.
    pub fn is_empty(&self) -> bool {
        self.tables_by_id().iter().all(|(_, t)| t.is_empty())
    }

    /// Applies every local table to its durable table: node tables first, then rel tables, each
    /// group in table id order.
    ///
    /// The first failing table stops the commit and is reported as
    /// [`StorageError::PartialCommit`]. Tables committed before it stay applied.
    pub fn commit(&self, txn: &Transaction) -> StorageResult<()> {
        let tables = self.tables_by_id();
        for phase in [TableType::Node, TableType::Rel] {
            for (table_id, local) in tables.iter().filter(|(_, t)| t.table_type() == phase) {
                self.commit_table(txn, *table_id, local)
                    .map_err(|source| StorageError::PartialCommit {
                        table_id: *table_id,
                        source: Box::new(source),
                    })?;
            }
        }
        Ok(())
    }

    fn commit_table(
        &self,
        txn: &Transaction,
        table_id: TableId,
        local: &LocalTable,
    ) -> StorageResult<()> {
        let table = self.context.storage_manager().get_table(table_id)?;
        let entry = self
            .context
            .catalog()
            .get_table_catalog_entry(self.read_ts, table.catalog_entry_id())?;
        let num_rows = table.commit(txn, &entry, local)?;
        self.context.wal_manager().log(
            txn.txn_id(),
            Operation::TableCommitted {
                table_id,
                table_type: table.table_type(),
                num_rows,
            },
        )?;
        debug!(table_id, num_rows, txn_id = %txn.txn_id(), "committed local table");
        Ok(())
    }

    /// Discards every staged row. The local tables themselves stay registered.
    pub fn rollback(&self) {
        for (_, local) in self.tables_by_id() {
            local.clear();
        }
    }

    pub fn estimated_mem_usage(&self) -> u64 {
        self.tables_by_id()
            .iter()
            .map(|(_, t)| t.estimated_mem_usage())
            .sum()
    }

    /// Snapshot of the registered local tables sorted by id, taken without holding the map
    /// lock afterwards.
    fn tables_by_id(&self) -> Vec<(TableId, Arc<LocalTable>)> {
        let mut tables: Vec<_> = self
            .tables
            .read()
            .iter()
            .map(|(id, t)| (*id, t.clone()))
            .collect();
        tables.sort_unstable_by_key(|(id, _)| *id);
        tables
    }
}
