use std::collections::BTreeSet;

use ferngraph_catalog::entry::TableCatalogEntry;
use ferngraph_common::constants::DEFAULT_VECTOR_CAPACITY;
use ferngraph_common::types::{ColumnId, InternalId, Offset, RowIdx, TableId, TableType};
use ferngraph_common::value::ScalarValue;
use parking_lot::RwLock;

use super::local_table::{
    AddColumnState, LocalScanBatch, LocalTableOps, LocalTableScanState, TableDeleteState,
    TableInsertState, TableUpdateState, state_mismatch,
};
use crate::common::row_group::ChunkedRowGroup;
use crate::error::StorageResult;

#[derive(Debug)]
struct LocalNodeTableInner {
    row_group: ChunkedRowGroup,
    deleted: BTreeSet<RowIdx>,
}

/// A staged node row handed to the durable table at commit.
#[derive(Debug, Clone)]
pub struct StagedNodeRow {
    pub values: Vec<ScalarValue>,
    pub deleted: bool,
}

/// Staged nodes of one node table.
///
/// Staged rows get offsets `start_offset + row_idx`, where `start_offset` is the durable row
/// count at creation. Deleted rows keep their offset so that offsets handed out earlier stay
/// stable until commit.
#[derive(Debug)]
pub struct LocalNodeTable {
    table_id: TableId,
    start_offset: Offset,
    inner: RwLock<LocalNodeTableInner>,
}

#[derive(Debug, Clone)]
pub struct LocalNodeTableScanState {
    /// Property columns to project; empty projects every column.
    pub column_ids: Vec<ColumnId>,
    next_row: RowIdx,
}

impl LocalNodeTableScanState {
    #[inline]
    pub fn new(column_ids: Vec<ColumnId>) -> Self {
        Self {
            column_ids,
            next_row: 0,
        }
    }
}

impl LocalNodeTable {
    pub fn new(entry: &TableCatalogEntry, start_offset: Offset, capacity: u64) -> Self {
        let column_types = entry
            .properties()
            .iter()
            .map(|p| p.logical_type())
            .collect();
        Self {
            table_id: entry.id(),
            start_offset,
            inner: RwLock::new(LocalNodeTableInner {
                row_group: ChunkedRowGroup::new(entry.id(), column_types, capacity),
                deleted: BTreeSet::new(),
            }),
        }
    }

    #[inline]
    pub fn start_offset(&self) -> Offset {
        self.start_offset
    }

    /// Returns the staged row of a live uncommitted node.
    pub fn lookup(&self, node_offset: Offset) -> Option<Vec<ScalarValue>> {
        let inner = self.inner.read();
        let row_idx = self.live_row(&inner, node_offset)?;
        inner.row_group.row(row_idx)
    }

    #[inline]
    pub fn contains_node(&self, node_offset: Offset) -> bool {
        self.live_row(&self.inner.read(), node_offset).is_some()
    }

    pub fn num_live_rows(&self) -> u64 {
        let inner = self.inner.read();
        inner.row_group.num_rows() - inner.deleted.len() as u64
    }

    /// Every staged row in offset order, deleted ones flagged.
    pub(crate) fn staged_rows(&self) -> Vec<StagedNodeRow> {
        let inner = self.inner.read();
        (0..inner.row_group.num_rows())
            .filter_map(|row_idx| {
                Some(StagedNodeRow {
                    values: inner.row_group.row(row_idx)?,
                    deleted: inner.deleted.contains(&row_idx),
                })
            })
            .collect()
    }

    fn live_row(&self, inner: &LocalNodeTableInner, node_offset: Offset) -> Option<RowIdx> {
        let row_idx = node_offset.checked_sub(self.start_offset)?;
        (row_idx < inner.row_group.num_rows() && !inner.deleted.contains(&row_idx))
            .then_some(row_idx)
    }
}

impl LocalTableOps for LocalNodeTable {
    #[inline]
    fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    fn table_type(&self) -> TableType {
        TableType::Node
    }

    fn insert(&self, state: &mut TableInsertState) -> StorageResult<()> {
        let TableInsertState::Node(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Node));
        };
        let row_idx = self
            .inner
            .write()
            .row_group
            .append_row(state.properties.clone())?;
        state.node_id = Some(InternalId::new(self.start_offset + row_idx, self.table_id));
        Ok(())
    }

    fn update(&self, state: &TableUpdateState) -> StorageResult<bool> {
        let TableUpdateState::Node(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Node));
        };
        let mut inner = self.inner.write();
        let Some(row_idx) = self.live_row(&inner, state.node_offset) else {
            return Ok(false);
        };
        inner
            .row_group
            .set(row_idx, state.column_id, state.value.clone())?;
        Ok(true)
    }

    fn delete(&self, state: &TableDeleteState) -> StorageResult<bool> {
        let TableDeleteState::Node(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Node));
        };
        let mut inner = self.inner.write();
        let Some(row_idx) = self.live_row(&inner, state.node_offset) else {
            return Ok(false);
        };
        inner.deleted.insert(row_idx);
        Ok(true)
    }

    fn add_column(&self, state: &AddColumnState) -> StorageResult<()> {
        self.inner
            .write()
            .row_group
            .add_column(state.property.logical_type(), &state.default_value)
    }

    fn initialize_scan(&self, state: &mut LocalTableScanState) -> StorageResult<()> {
        let LocalTableScanState::Node(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Node));
        };
        state.next_row = 0;
        Ok(())
    }

    fn scan(&self, state: &mut LocalTableScanState) -> StorageResult<Option<LocalScanBatch>> {
        let LocalTableScanState::Node(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Node));
        };
        let inner = self.inner.read();
        let column_ids: Vec<ColumnId> = if state.column_ids.is_empty() {
            (0..inner.row_group.num_columns() as ColumnId).collect()
        } else {
            state.column_ids.clone()
        };

        let mut batch = LocalScanBatch::default();
        while state.next_row < inner.row_group.num_rows()
            && (batch.len() as u64) < DEFAULT_VECTOR_CAPACITY
        {
            let row_idx = state.next_row;
            state.next_row += 1;
            if inner.deleted.contains(&row_idx) {
                continue;
            }
            batch.ids.push(InternalId::new(
                self.start_offset + row_idx,
                self.table_id,
            ));
            batch
                .rows
                .push(inner.row_group.project_row(row_idx, &column_ids)?);
        }
        Ok((!batch.is_empty()).then_some(batch))
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.row_group.reset();
        inner.deleted.clear();
    }

    fn is_empty(&self) -> bool {
        self.inner.read().row_group.is_empty()
    }

    fn num_rows(&self) -> u64 {
        self.inner.read().row_group.num_rows()
    }

    fn estimated_mem_usage(&self) -> u64 {
        let inner = self.inner.read();
        inner.row_group.estimated_mem_usage()
            + (inner.deleted.len() * size_of::<RowIdx>()) as u64
    }
}

#[cfg(test)]
mod tests {
    use ferngraph_catalog::entry::TableCatalogEntryKind;
    use ferngraph_catalog::property::PropertyDefinition;
    use ferngraph_common::data_type::LogicalType;
    use ferngraph_transaction::Timestamp;

    use super::*;
    use crate::local_storage::local_table::{NodeTableDeleteState, NodeTableUpdateState};

    fn person_table(start_offset: Offset) -> LocalNodeTable {
        let entry = TableCatalogEntry::new(
            0,
            "person",
            TableCatalogEntryKind::Node,
            vec![
                PropertyDefinition::new("name", LogicalType::String, false),
                PropertyDefinition::new("age", LogicalType::Int32, true),
            ],
            Timestamp::SYSTEM,
        );
        LocalNodeTable::new(&entry, start_offset, 1024)
    }

    fn insert(table: &LocalNodeTable, name: &str, age: i32) -> InternalId {
        let mut state = TableInsertState::node(vec![name.into(), age.into()]);
        table.insert(&mut state).unwrap();
        state.inserted_id().unwrap()
    }

    #[test]
    fn test_offsets_continue_after_durable_rows() {
        let table = person_table(10);
        assert_eq!(insert(&table, "alice", 30), InternalId::new(10, 0));
        assert_eq!(insert(&table, "bob", 25), InternalId::new(11, 0));
        assert_eq!(table.lookup(11).unwrap()[0], ScalarValue::from("bob"));
        assert!(table.lookup(9).is_none());
    }

    #[test]
    fn test_update_and_delete_only_touch_local_rows() {
        let table = person_table(0);
        insert(&table, "alice", 30);

        let update = TableUpdateState::Node(NodeTableUpdateState {
            node_offset: 0,
            column_id: 1,
            value: 31i32.into(),
        });
        assert!(table.update(&update).unwrap());
        assert_eq!(table.lookup(0).unwrap()[1], ScalarValue::from(31i32));

        let missing = TableDeleteState::Node(NodeTableDeleteState { node_offset: 5 });
        assert!(!table.delete(&missing).unwrap());

        let delete = TableDeleteState::Node(NodeTableDeleteState { node_offset: 0 });
        assert!(table.delete(&delete).unwrap());
        assert!(!table.delete(&delete).unwrap());
        assert!(!table.contains_node(0));
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.num_live_rows(), 0);

        let staged = table.staged_rows();
        assert_eq!(staged.len(), 1);
        assert!(staged[0].deleted);
    }

    #[test]
    fn test_scan_skips_deleted_rows() {
        let table = person_table(0);
        for i in 0..4 {
            insert(&table, &format!("p{i}"), i);
        }
        table
            .delete(&TableDeleteState::Node(NodeTableDeleteState { node_offset: 1 }))
            .unwrap();

        let mut state = LocalTableScanState::Node(LocalNodeTableScanState::new(vec![0]));
        table.initialize_scan(&mut state).unwrap();
        let batch = table.scan(&mut state).unwrap().unwrap();
        let offsets: Vec<_> = batch.ids.iter().map(|id| id.offset).collect();
        assert_eq!(offsets, vec![0, 2, 3]);
        assert_eq!(batch.rows[1], vec![ScalarValue::from("p2")]);
        assert!(table.scan(&mut state).unwrap().is_none());

        table.initialize_scan(&mut state).unwrap();
        assert_eq!(table.scan(&mut state).unwrap().unwrap().len(), 3);
    }

    #[test]
    fn test_rel_state_rejected() {
        let table = person_table(0);
        let mut state = TableInsertState::rel(InternalId::new(0, 0), InternalId::new(1, 0), vec![]);
        assert!(matches!(
            table.insert(&mut state),
            Err(crate::error::StorageError::ConsistencyViolation(_))
        ));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let table = person_table(0);
        insert(&table, "alice", 30);
        table.clear();
        assert!(table.is_empty());
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.estimated_mem_usage(), 0);
    }
}
