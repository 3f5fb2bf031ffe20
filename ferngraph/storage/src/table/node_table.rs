use std::any::Any;
use std::sync::Arc;

use ferngraph_catalog::entry::{TableCatalogEntry, TableCatalogEntryKind};
use ferngraph_common::types::{InternalId, Offset, TableId, TableType};
use ferngraph_common::value::ScalarValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Table, TableSnapshot};
use crate::error::{StorageError, StorageResult};
use crate::local_storage::local_table::LocalTable;
use crate::tp::transaction::Transaction;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRow {
    pub values: Vec<ScalarValue>,
    /// Deleted rows stay as tombstones so that offsets never shift.
    pub deleted: bool,
}

/// Durable node rows addressed by offset.
#[derive(Debug)]
pub struct NodeTable {
    table_id: TableId,
    rows: RwLock<Vec<NodeRow>>,
}

impl NodeTable {
    pub fn new(entry: &TableCatalogEntry) -> StorageResult<Self> {
        if !matches!(entry.kind(), TableCatalogEntryKind::Node) {
            return Err(StorageError::TypeMismatch {
                expected: "node table entry".to_string(),
                actual: format!("{:?}", entry.kind()),
            });
        }
        Ok(Self::from_rows(entry.id(), Vec::new()))
    }

    pub(crate) fn from_rows(table_id: TableId, rows: Vec<NodeRow>) -> Self {
        Self {
            table_id,
            rows: RwLock::new(rows),
        }
    }

    pub fn lookup(&self, offset: Offset) -> Option<Vec<ScalarValue>> {
        let rows = self.rows.read();
        let row = rows.get(usize::try_from(offset).ok()?)?;
        (!row.deleted).then(|| row.values.clone())
    }

    #[inline]
    pub fn contains_node(&self, offset: Offset) -> bool {
        usize::try_from(offset)
            .ok()
            .and_then(|idx| self.rows.read().get(idx).map(|row| !row.deleted))
            .unwrap_or(false)
    }

    pub fn num_live_rows(&self) -> u64 {
        self.rows.read().iter().filter(|row| !row.deleted).count() as u64
    }

    /// Every live node with its values, in offset order.
    pub fn scan(&self) -> Vec<(InternalId, Vec<ScalarValue>)> {
        self.rows
            .read()
            .iter()
            .enumerate()
            .filter(|(_, row)| !row.deleted)
            .map(|(offset, row)| {
                (
                    InternalId::new(offset as Offset, self.table_id),
                    row.values.clone(),
                )
            })
            .collect()
    }
}

impl Table for NodeTable {
    #[inline]
    fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    fn table_type(&self) -> TableType {
        TableType::Node
    }

    #[inline]
    fn catalog_entry_id(&self) -> TableId {
        self.table_id
    }

    fn num_rows(&self) -> u64 {
        self.rows.read().len() as u64
    }

    fn commit(
        &self,
        txn: &Transaction,
        entry: &TableCatalogEntry,
        local_table: &LocalTable,
    ) -> StorageResult<u64> {
        let local = local_table.as_node().ok_or_else(|| {
            StorageError::ConsistencyViolation(format!(
                "node table {} received a rel local table",
                self.table_id
            ))
        })?;
        let staged = local.staged_rows();
        if let Some(row) = staged
            .iter()
            .find(|row| row.values.len() != entry.properties().len())
        {
            return Err(StorageError::TypeMismatch {
                expected: format!("{} properties", entry.properties().len()),
                actual: format!("{} values", row.values.len()),
            });
        }

        let mut rows = self.rows.write();
        if local.start_offset() != rows.len() as Offset {
            return Err(StorageError::ConsistencyViolation(format!(
                "node table {} has {} rows but staged offsets start at {}",
                self.table_id,
                rows.len(),
                local.start_offset()
            )));
        }
        let num_live = staged.iter().filter(|row| !row.deleted).count() as u64;
        rows.extend(staged.into_iter().map(|row| NodeRow {
            values: row.values,
            deleted: row.deleted,
        }));
        debug!(
            table_id = self.table_id,
            txn_id = %txn.txn_id(),
            num_live,
            "committed node rows"
        );
        Ok(num_live)
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot::Node {
            table_id: self.table_id,
            rows: self.rows.read().clone(),
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
