use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use ferngraph_catalog::entry::{TableCatalogEntry, TableCatalogEntryKind};
use ferngraph_catalog::provider::CatalogProvider;
use ferngraph_common::types::{TableId, TableType};
use ferngraph_transaction::Timestamp;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::table::node_table::NodeTable;
use crate::table::rel_table::RelTable;
use crate::table::{Table, TableRef, TableSnapshot};

/// Registry of the durable tables of a database.
#[derive(Debug, Default)]
pub struct StorageManager {
    tables: DashMap<TableId, TableRef>,
}

impl StorageManager {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node_table(&self, entry: &TableCatalogEntry) -> StorageResult<Arc<NodeTable>> {
        let table = Arc::new(NodeTable::new(entry)?);
        self.register_table(table.clone())?;
        Ok(table)
    }

    pub fn create_rel_table(&self, entry: &TableCatalogEntry) -> StorageResult<Arc<RelTable>> {
        let table = Arc::new(RelTable::new(entry)?);
        self.register_table(table.clone())?;
        Ok(table)
    }

    /// Creates a durable table for every node and rel table in `catalog` that has none yet.
    ///
    /// Rel groups get no table of their own.
    pub fn create_tables_from_catalog(
        &self,
        catalog: &dyn CatalogProvider,
        read_ts: Timestamp,
    ) -> StorageResult<()> {
        for table_id in catalog.table_ids() {
            if self.tables.contains_key(&table_id) {
                continue;
            }
            let entry = catalog.get_table_catalog_entry(read_ts, table_id)?;
            match entry.kind() {
                TableCatalogEntryKind::Node => {
                    self.create_node_table(&entry)?;
                }
                TableCatalogEntryKind::Rel { .. } => {
                    self.create_rel_table(&entry)?;
                }
                TableCatalogEntryKind::RelGroup { .. } => {}
            }
        }
        Ok(())
    }

    pub fn register_table(&self, table: TableRef) -> StorageResult<()> {
        let table_id = table.table_id();
        match self.tables.entry(table_id) {
            Entry::Occupied(_) => Err(StorageError::ConsistencyViolation(format!(
                "table {table_id} is already registered"
            ))),
            Entry::Vacant(e) => {
                debug!(table_id, table_type = ?table.table_type(), "registered table");
                e.insert(table);
                Ok(())
            }
        }
    }

    pub fn get_table(&self, table_id: TableId) -> StorageResult<TableRef> {
        self.tables
            .get(&table_id)
            .map(|t| t.value().clone())
            .ok_or(StorageError::TableNotFound(table_id))
    }

    pub fn get_node_table(&self, table_id: TableId) -> StorageResult<Arc<NodeTable>> {
        self.get_table(table_id)?
            .into_any()
            .downcast::<NodeTable>()
            .map_err(|_| kind_mismatch(table_id, TableType::Node))
    }

    pub fn get_rel_table(&self, table_id: TableId) -> StorageResult<Arc<RelTable>> {
        self.get_table(table_id)?
            .into_any()
            .downcast::<RelTable>()
            .map_err(|_| kind_mismatch(table_id, TableType::Rel))
    }

    pub fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.tables.iter().map(|t| *t.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Images of every table, ordered by table id.
    pub fn snapshot(&self) -> Vec<TableSnapshot> {
        self.table_ids()
            .into_iter()
            .filter_map(|id| self.tables.get(&id).map(|t| t.snapshot()))
            .collect()
    }

    /// Replaces the registered tables with the ones described by `snapshots`.
    pub fn restore(&self, snapshots: Vec<TableSnapshot>) -> StorageResult<()> {
        self.tables.clear();
        let num_tables = snapshots.len();
        for snapshot in snapshots {
            let table: TableRef = match snapshot {
                TableSnapshot::Node { table_id, rows } => {
                    Arc::new(NodeTable::from_rows(table_id, rows))
                }
                TableSnapshot::Rel {
                    table_id,
                    rel_group_id,
                    src_table_id,
                    dst_table_id,
                    property_types,
                    rows,
                } => Arc::new(RelTable::from_rows(
                    table_id,
                    rel_group_id,
                    src_table_id,
                    dst_table_id,
                    property_types,
                    rows,
                )),
            };
            self.register_table(table)?;
        }
        info!(num_tables, "restored tables from snapshot");
        Ok(())
    }
}

fn kind_mismatch(table_id: TableId, expected: TableType) -> StorageError {
    StorageError::TypeMismatch {
        expected: format!("{expected:?} table"),
        actual: format!("table {table_id} of another kind"),
    }
}
