pub mod node_table;
pub mod rel_table;

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use ferngraph_catalog::entry::TableCatalogEntry;
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{TableId, TableType};
use serde::{Deserialize, Serialize};

use self::node_table::NodeRow;
use self::rel_table::RelRow;
use crate::error::StorageResult;
use crate::local_storage::local_table::LocalTable;
use crate::tp::transaction::Transaction;

pub type TableRef = Arc<dyn Table>;

/// A durable table the commit path merges staged rows into.
pub trait Table: Debug + Send + Sync + 'static {
    fn table_id(&self) -> TableId;

    fn table_type(&self) -> TableType;

    /// Id of the catalog entry describing this table: the table itself for node tables, the
    /// enclosing rel group for rel tables.
    fn catalog_entry_id(&self) -> TableId;

    /// Number of durable rows, tombstones included.
    fn num_rows(&self) -> u64;

    /// Merges the rows staged in `local_table` and returns how many became durable.
    fn commit(
        &self,
        txn: &Transaction,
        entry: &TableCatalogEntry,
        local_table: &LocalTable,
    ) -> StorageResult<u64>;

    fn snapshot(&self) -> TableSnapshot;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Serializable image of a durable table, as stored in checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TableSnapshot {
    Node {
        table_id: TableId,
        rows: Vec<NodeRow>,
    },
    Rel {
        table_id: TableId,
        rel_group_id: TableId,
        src_table_id: TableId,
        dst_table_id: TableId,
        property_types: Vec<LogicalType>,
        rows: Vec<RelRow>,
    },
}

impl TableSnapshot {
    #[inline]
    pub fn table_id(&self) -> TableId {
        match self {
            TableSnapshot::Node { table_id, .. } | TableSnapshot::Rel { table_id, .. } => {
                *table_id
            }
        }
    }
}
