use ferngraph_catalog::property::PropertyDefinition;
use ferngraph_common::types::{ColumnId, InternalId, Offset, TableId, TableType};
use ferngraph_common::value::ScalarValue;

use super::local_node_table::{LocalNodeTable, LocalNodeTableScanState};
use super::local_rel_table::{LocalRelTable, LocalRelTableScanState};
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct NodeTableInsertState {
    pub properties: Vec<ScalarValue>,
    /// Set by a successful insert.
    pub node_id: Option<InternalId>,
}

#[derive(Debug, Clone)]
pub struct RelTableInsertState {
    pub src: InternalId,
    pub dst: InternalId,
    pub properties: Vec<ScalarValue>,
    /// Set by a successful insert to the uncommitted rel id.
    pub rel_id: Option<InternalId>,
}

#[derive(Debug, Clone)]
pub enum TableInsertState {
    Node(NodeTableInsertState),
    Rel(RelTableInsertState),
}

impl TableInsertState {
    #[inline]
    pub fn node(properties: Vec<ScalarValue>) -> Self {
        TableInsertState::Node(NodeTableInsertState {
            properties,
            node_id: None,
        })
    }

    #[inline]
    pub fn rel(src: InternalId, dst: InternalId, properties: Vec<ScalarValue>) -> Self {
        TableInsertState::Rel(RelTableInsertState {
            src,
            dst,
            properties,
            rel_id: None,
        })
    }

    /// The id assigned to the inserted node or relationship.
    #[inline]
    pub fn inserted_id(&self) -> Option<InternalId> {
        match self {
            TableInsertState::Node(state) => state.node_id,
            TableInsertState::Rel(state) => state.rel_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NodeTableUpdateState {
    pub node_offset: Offset,
    /// Property column to overwrite.
    pub column_id: ColumnId,
    pub value: ScalarValue,
}

#[derive(Debug, Clone)]
pub struct RelTableUpdateState {
    pub src_offset: Offset,
    pub dst_offset: Offset,
    pub rel_offset: Offset,
    /// Column in the durable rel layout `[nbr, rel_id, properties…]`.
    pub column_id: ColumnId,
    pub value: ScalarValue,
}

#[derive(Debug, Clone)]
pub enum TableUpdateState {
    Node(NodeTableUpdateState),
    Rel(RelTableUpdateState),
}

#[derive(Debug, Clone, Copy)]
pub struct NodeTableDeleteState {
    pub node_offset: Offset,
}

#[derive(Debug, Clone, Copy)]
pub struct RelTableDeleteState {
    pub src_offset: Offset,
    pub dst_offset: Offset,
    pub rel_offset: Offset,
}

#[derive(Debug, Clone, Copy)]
pub enum TableDeleteState {
    Node(NodeTableDeleteState),
    Rel(RelTableDeleteState),
}

#[derive(Debug, Clone)]
pub struct AddColumnState {
    pub property: PropertyDefinition,
    pub default_value: ScalarValue,
}

#[derive(Debug, Clone)]
pub enum LocalTableScanState {
    Node(LocalNodeTableScanState),
    Rel(LocalRelTableScanState),
}

/// One batch of staged rows produced by a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalScanBatch {
    /// The bound node the rows hang off, for rel scans.
    pub bound_offset: Option<Offset>,
    /// Node ids for node scans, rel ids for rel scans.
    pub ids: Vec<InternalId>,
    /// Projected values, one entry per id.
    pub rows: Vec<Vec<ScalarValue>>,
}

impl LocalScanBatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Operations every local table variant supports.
///
/// Passing a state of the other variant is a caller bug and yields
/// [`StorageError::ConsistencyViolation`].
pub trait LocalTableOps {
    fn table_id(&self) -> TableId;

    fn table_type(&self) -> TableType;

    fn insert(&self, state: &mut TableInsertState) -> StorageResult<()>;

    /// Returns `false` when no staged row matches.
    fn update(&self, state: &TableUpdateState) -> StorageResult<bool>;

    /// Returns `false` when no staged row matches.
    fn delete(&self, state: &TableDeleteState) -> StorageResult<bool>;

    fn add_column(&self, state: &AddColumnState) -> StorageResult<()>;

    /// Resets the cursor of `state`. Never touches staged data.
    fn initialize_scan(&self, state: &mut LocalTableScanState) -> StorageResult<()>;

    /// Produces the next batch, or `None` once the scan is exhausted.
    fn scan(&self, state: &mut LocalTableScanState) -> StorageResult<Option<LocalScanBatch>>;

    fn clear(&self);

    fn is_empty(&self) -> bool;

    /// Number of staged rows, deleted ones included.
    fn num_rows(&self) -> u64;

    fn estimated_mem_usage(&self) -> u64;
}

pub(super) fn state_mismatch(table_id: TableId, expected: TableType) -> StorageError {
    StorageError::ConsistencyViolation(format!(
        "local table {table_id} expects {expected:?} states"
    ))
}

/// A per-transaction staging table, either for a node table or a rel table.
#[derive(Debug)]
pub enum LocalTable {
    Node(LocalNodeTable),
    Rel(LocalRelTable),
}

impl LocalTable {
    #[inline]
    pub fn as_node(&self) -> Option<&LocalNodeTable> {
        match self {
            LocalTable::Node(table) => Some(table),
            LocalTable::Rel(_) => None,
        }
    }

    #[inline]
    pub fn as_rel(&self) -> Option<&LocalRelTable> {
        match self {
            LocalTable::Rel(table) => Some(table),
            LocalTable::Node(_) => None,
        }
    }

    #[inline]
    fn ops(&self) -> &dyn LocalTableOps {
        match self {
            LocalTable::Node(table) => table,
            LocalTable::Rel(table) => table,
        }
    }
}

impl LocalTableOps for LocalTable {
    fn table_id(&self) -> TableId {
        self.ops().table_id()
    }

    fn table_type(&self) -> TableType {
        self.ops().table_type()
    }

    fn insert(&self, state: &mut TableInsertState) -> StorageResult<()> {
        self.ops().insert(state)
    }

    fn update(&self, state: &TableUpdateState) -> StorageResult<bool> {
        self.ops().update(state)
    }

    fn delete(&self, state: &TableDeleteState) -> StorageResult<bool> {
        self.ops().delete(state)
    }

    fn add_column(&self, state: &AddColumnState) -> StorageResult<()> {
        self.ops().add_column(state)
    }

    fn initialize_scan(&self, state: &mut LocalTableScanState) -> StorageResult<()> {
        self.ops().initialize_scan(state)
    }

    fn scan(&self, state: &mut LocalTableScanState) -> StorageResult<Option<LocalScanBatch>> {
        self.ops().scan(state)
    }

    fn clear(&self) {
        self.ops().clear()
    }

    fn is_empty(&self) -> bool {
        self.ops().is_empty()
    }

    fn num_rows(&self) -> u64 {
        self.ops().num_rows()
    }

    fn estimated_mem_usage(&self) -> u64 {
        self.ops().estimated_mem_usage()
    }
}
