use ferngraph_catalog::entry::TableCatalogEntry;
use ferngraph_common::constants::{DEFAULT_VECTOR_CAPACITY, LOCAL_REL_OFFSET_START};
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{
    ColumnId, InternalId, Offset, RelDataDirection, RowIdx, TableId, TableType,
};
use ferngraph_common::value::ScalarValue;
use parking_lot::RwLock;

use super::csr_index::{DirectedCsrIndex, intersect_sorted};
use super::local_table::{
    AddColumnState, LocalScanBatch, LocalTableOps, LocalTableScanState, RelTableDeleteState,
    RelTableInsertState, RelTableUpdateState, TableDeleteState, TableInsertState,
    TableUpdateState, state_mismatch,
};
use crate::common::row_group::ChunkedRowGroup;
use crate::error::{StorageError, StorageResult};
use crate::table::rel_table::{NBR_ID_COLUMN_ID, REL_ID_COLUMN_ID};

pub const LOCAL_BOUND_NODE_ID_COLUMN_ID: ColumnId = 0;
pub const LOCAL_NBR_NODE_ID_COLUMN_ID: ColumnId = 1;
pub const LOCAL_REL_ID_COLUMN_ID: ColumnId = 2;
/// Number of leading key columns in a staged rel row.
pub const LOCAL_NUM_KEY_COLUMNS: usize = 3;

/// Maps a column of the durable rel layout `[nbr, rel_id, properties…]` onto the staged layout
/// `[bound, nbr, rel_id, properties…]`.
///
/// Staged rows always store the source node first, so the durable nbr column is the staged
/// nbr column for forward scans and the staged bound column for backward scans.
#[inline]
pub fn rewrite_local_column_id(direction: RelDataDirection, column_id: ColumnId) -> ColumnId {
    if column_id == NBR_ID_COLUMN_ID {
        match direction {
            RelDataDirection::Fwd => LOCAL_NBR_NODE_ID_COLUMN_ID,
            RelDataDirection::Bwd => LOCAL_BOUND_NODE_ID_COLUMN_ID,
        }
    } else {
        column_id + 1
    }
}

pub fn rewrite_local_column_ids(
    direction: RelDataDirection,
    column_ids: &[ColumnId],
) -> Vec<ColumnId> {
    column_ids
        .iter()
        .map(|&c| rewrite_local_column_id(direction, c))
        .collect()
}

/// A staged relationship handed to the durable table at commit.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRelRow {
    pub src: InternalId,
    pub dst: InternalId,
    pub properties: Vec<ScalarValue>,
}

#[derive(Debug)]
struct LocalRelTableInner {
    row_group: ChunkedRowGroup,
    directed_indices: [DirectedCsrIndex; 2],
}

/// Staged relationships of one rel table, indexed in both directions.
///
/// A single lock guards the row group together with both directional indices, so an insert
/// or delete is observed by concurrent readers either entirely or not at all.
#[derive(Debug)]
pub struct LocalRelTable {
    table_id: TableId,
    rel_group_id: TableId,
    inner: RwLock<LocalRelTableInner>,
}

/// Cursor over the staged relationships of a list of bound nodes.
#[derive(Debug, Clone)]
pub struct LocalRelTableScanState {
    pub direction: RelDataDirection,
    /// Columns in the durable rel layout; empty projects every column.
    pub column_ids: Vec<ColumnId>,
    full_scan: bool,
    bound_nodes: Vec<Offset>,
    curr_bound_node_idx: usize,
    row_indices: Vec<RowIdx>,
    next_row_to_scan: usize,
}

impl LocalRelTableScanState {
    /// Scans the relationships of `bound_nodes`, in that order.
    pub fn for_bound_nodes(
        direction: RelDataDirection,
        bound_nodes: Vec<Offset>,
        column_ids: Vec<ColumnId>,
    ) -> Self {
        Self {
            direction,
            column_ids,
            full_scan: false,
            bound_nodes,
            curr_bound_node_idx: 0,
            row_indices: Vec::new(),
            next_row_to_scan: 0,
        }
    }

    /// Scans every staged relationship, grouped by bound node in ascending order.
    ///
    /// The set of bound nodes is fixed by `initialize_scan`.
    pub fn full(direction: RelDataDirection, column_ids: Vec<ColumnId>) -> Self {
        Self {
            full_scan: true,
            ..Self::for_bound_nodes(direction, Vec::new(), column_ids)
        }
    }

    fn reset(&mut self) {
        self.curr_bound_node_idx = 0;
        self.row_indices.clear();
        self.next_row_to_scan = 0;
    }
}

impl LocalRelTable {
    /// Creates the staging table of rel table `table_id`, laid out after its rel group.
    pub fn new(table_id: TableId, rel_group_entry: &TableCatalogEntry, capacity: u64) -> Self {
        let column_types = [LogicalType::InternalId; LOCAL_NUM_KEY_COLUMNS]
            .into_iter()
            .chain(rel_group_entry.properties().iter().map(|p| p.logical_type()))
            .collect();
        Self {
            table_id,
            rel_group_id: rel_group_entry.id(),
            inner: RwLock::new(LocalRelTableInner {
                row_group: ChunkedRowGroup::new(table_id, column_types, capacity),
                directed_indices: [DirectedCsrIndex::new(), DirectedCsrIndex::new()],
            }),
        }
    }

    #[inline]
    pub fn rel_group_id(&self) -> TableId {
        self.rel_group_id
    }

    /// True iff any of `node_ids` has a staged relationship in `direction`.
    pub fn check_if_node_has_rels(
        &self,
        node_ids: &[InternalId],
        direction: RelDataDirection,
    ) -> bool {
        let inner = self.inner.read();
        let index = &inner.directed_indices[direction.idx()];
        node_ids.iter().any(|id| index.contains_node(id.offset))
    }

    /// Number of staged relationships that have not been deleted.
    pub fn num_live_rows(&self) -> u64 {
        self.inner.read().directed_indices[RelDataDirection::Fwd.idx()].num_rows() as u64
    }

    /// Verifies that both directional indices describe the same set of rows.
    pub fn check_consistency(&self) -> StorageResult<()> {
        let inner = self.inner.read();
        let [fwd, bwd] = &inner.directed_indices;
        if fwd.is_empty() != bwd.is_empty() || fwd.num_rows() != bwd.num_rows() {
            return Err(StorageError::ConsistencyViolation(format!(
                "directional indices of local rel table {} disagree: {} forward rows, {} backward \
                 rows",
                self.table_id,
                fwd.num_rows(),
                bwd.num_rows()
            )));
        }
        for (bound, rows) in fwd.iter() {
            for &row_idx in rows {
                let src = read_id(&inner.row_group, row_idx, LOCAL_BOUND_NODE_ID_COLUMN_ID)?;
                let dst = read_id(&inner.row_group, row_idx, LOCAL_NBR_NODE_ID_COLUMN_ID)?;
                let in_bwd = bwd
                    .get(dst.offset)
                    .is_some_and(|rows| rows.binary_search(&row_idx).is_ok());
                if src.offset != bound || !in_bwd {
                    return Err(StorageError::ConsistencyViolation(format!(
                        "row {row_idx} of local rel table {} is indexed inconsistently",
                        self.table_id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Live staged relationships ordered by source node, then insertion order.
    pub(crate) fn staged_rows(&self) -> StorageResult<Vec<StagedRelRow>> {
        let inner = self.inner.read();
        let fwd = &inner.directed_indices[RelDataDirection::Fwd.idx()];
        let mut rows = Vec::with_capacity(fwd.num_rows());
        for (_, row_indices) in fwd.iter() {
            for &row_idx in row_indices {
                let mut values = inner.row_group.row(row_idx).ok_or_else(|| {
                    StorageError::ConsistencyViolation(format!(
                        "indexed row {row_idx} missing from local rel table {}",
                        self.table_id
                    ))
                })?;
                let properties = values.split_off(LOCAL_NUM_KEY_COLUMNS);
                rows.push(StagedRelRow {
                    src: as_id(&values[LOCAL_BOUND_NODE_ID_COLUMN_ID as usize], self.table_id)?,
                    dst: as_id(&values[LOCAL_NBR_NODE_ID_COLUMN_ID as usize], self.table_id)?,
                    properties,
                });
            }
        }
        Ok(rows)
    }

    fn insert_rel(&self, state: &mut RelTableInsertState) -> StorageResult<()> {
        let mut inner = self.inner.write();
        let rel_id = InternalId::new(
            LOCAL_REL_OFFSET_START + inner.row_group.num_rows(),
            self.table_id,
        );
        let mut values = Vec::with_capacity(LOCAL_NUM_KEY_COLUMNS + state.properties.len());
        values.push(state.src.into());
        values.push(state.dst.into());
        values.push(rel_id.into());
        values.extend(state.properties.iter().cloned());
        let row_idx = inner.row_group.append_row(values)?;

        let [fwd, bwd] = &mut inner.directed_indices;
        fwd.insert(state.src.offset, row_idx);
        bwd.insert(state.dst.offset, row_idx);
        state.rel_id = Some(rel_id);
        Ok(())
    }

    /// Finds the staged row of relationship `rel_offset` between `src_offset` and
    /// `dst_offset` by intersecting the forward list of the source with the backward list of
    /// the destination.
    fn find_matching_row(
        &self,
        inner: &LocalRelTableInner,
        src_offset: Offset,
        dst_offset: Offset,
        rel_offset: Offset,
    ) -> StorageResult<Option<RowIdx>> {
        let [fwd, bwd] = &inner.directed_indices;
        let (Some(src_rows), Some(dst_rows)) = (fwd.get(src_offset), bwd.get(dst_offset)) else {
            return Ok(None);
        };
        for row_idx in intersect_sorted(src_rows, dst_rows) {
            if read_id(&inner.row_group, row_idx, LOCAL_REL_ID_COLUMN_ID)?.offset == rel_offset {
                return Ok(Some(row_idx));
            }
        }
        Ok(None)
    }

    fn update_rel(&self, state: &RelTableUpdateState) -> StorageResult<bool> {
        if state.column_id == NBR_ID_COLUMN_ID || state.column_id == REL_ID_COLUMN_ID {
            return Err(StorageError::ConsistencyViolation(format!(
                "key column {} of rel table {} cannot be updated",
                state.column_id, self.table_id
            )));
        }
        let mut inner = self.inner.write();
        let Some(row_idx) =
            self.find_matching_row(&inner, state.src_offset, state.dst_offset, state.rel_offset)?
        else {
            return Ok(false);
        };
        let column_id = rewrite_local_column_id(RelDataDirection::Fwd, state.column_id);
        inner.row_group.set(row_idx, column_id, state.value.clone())?;
        Ok(true)
    }

    fn delete_rel(&self, state: &RelTableDeleteState) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        let Some(row_idx) =
            self.find_matching_row(&inner, state.src_offset, state.dst_offset, state.rel_offset)?
        else {
            return Ok(false);
        };
        let [fwd, bwd] = &mut inner.directed_indices;
        if !fwd.remove(state.src_offset, row_idx) || !bwd.remove(state.dst_offset, row_idx) {
            return Err(StorageError::ConsistencyViolation(format!(
                "row {row_idx} of local rel table {} vanished from an index during delete",
                self.table_id
            )));
        }
        Ok(true)
    }

    fn scan_rel(
        &self,
        state: &mut LocalRelTableScanState,
    ) -> StorageResult<Option<LocalScanBatch>> {
        let inner = self.inner.read();
        let index = &inner.directed_indices[state.direction.idx()];
        let column_ids = if state.column_ids.is_empty() {
            (0..(inner.row_group.num_columns() - 1) as ColumnId)
                .map(|c| rewrite_local_column_id(state.direction, c))
                .collect()
        } else {
            rewrite_local_column_ids(state.direction, &state.column_ids)
        };

        loop {
            let Some(&bound) = state.bound_nodes.get(state.curr_bound_node_idx) else {
                return Ok(None);
            };
            if state.row_indices.is_empty() {
                if let Some(rows) = index.get(bound) {
                    state.row_indices = rows.to_vec();
                    state.next_row_to_scan = 0;
                }
            }
            let num_to_scan = (state.row_indices.len() - state.next_row_to_scan)
                .min(DEFAULT_VECTOR_CAPACITY as usize);
            if num_to_scan == 0 {
                state.curr_bound_node_idx += 1;
                state.next_row_to_scan = 0;
                state.row_indices.clear();
                continue;
            }

            let mut batch = LocalScanBatch {
                bound_offset: Some(bound),
                ..Default::default()
            };
            let start = state.next_row_to_scan;
            for &row_idx in &state.row_indices[start..start + num_to_scan] {
                batch.ids.push(read_id(
                    &inner.row_group,
                    row_idx,
                    LOCAL_REL_ID_COLUMN_ID,
                )?);
                batch
                    .rows
                    .push(inner.row_group.project_row(row_idx, &column_ids)?);
            }
            state.next_row_to_scan += num_to_scan;
            return Ok(Some(batch));
        }
    }
}

impl LocalTableOps for LocalRelTable {
    #[inline]
    fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    fn table_type(&self) -> TableType {
        TableType::Rel
    }

    fn insert(&self, state: &mut TableInsertState) -> StorageResult<()> {
        match state {
            TableInsertState::Rel(state) => self.insert_rel(state),
            TableInsertState::Node(_) => Err(state_mismatch(self.table_id, TableType::Rel)),
        }
    }

    fn update(&self, state: &TableUpdateState) -> StorageResult<bool> {
        match state {
            TableUpdateState::Rel(state) => self.update_rel(state),
            TableUpdateState::Node(_) => Err(state_mismatch(self.table_id, TableType::Rel)),
        }
    }

    fn delete(&self, state: &TableDeleteState) -> StorageResult<bool> {
        match state {
            TableDeleteState::Rel(state) => self.delete_rel(state),
            TableDeleteState::Node(_) => Err(state_mismatch(self.table_id, TableType::Rel)),
        }
    }

    fn add_column(&self, state: &AddColumnState) -> StorageResult<()> {
        self.inner
            .write()
            .row_group
            .add_column(state.property.logical_type(), &state.default_value)
    }

    fn initialize_scan(&self, state: &mut LocalTableScanState) -> StorageResult<()> {
        let LocalTableScanState::Rel(state) = state else {
            return Err(state_mismatch(self.table_id, TableType::Rel));
        };
        state.reset();
        if state.full_scan {
            state.bound_nodes =
                self.inner.read().directed_indices[state.direction.idx()].node_offsets();
        }
        Ok(())
    }

    fn scan(&self, state: &mut LocalTableScanState) -> StorageResult<Option<LocalScanBatch>> {
        match state {
            LocalTableScanState::Rel(state) => self.scan_rel(state),
            LocalTableScanState::Node(_) => Err(state_mismatch(self.table_id, TableType::Rel)),
        }
    }

    fn clear(&self) {
        let mut inner = self.inner.write();
        inner.row_group.reset();
        for index in &mut inner.directed_indices {
            index.clear();
        }
    }

    fn is_empty(&self) -> bool {
        let inner = self.inner.read();
        let [fwd, bwd] = &inner.directed_indices;
        debug_assert_eq!(fwd.is_empty(), bwd.is_empty());
        fwd.is_empty()
    }

    fn num_rows(&self) -> u64 {
        self.inner.read().row_group.num_rows()
    }

    fn estimated_mem_usage(&self) -> u64 {
        let inner = self.inner.read();
        let index_usage: usize = inner
            .directed_indices
            .iter()
            .map(|index| {
                index.num_nodes() * size_of::<Offset>() + index.num_rows() * size_of::<RowIdx>()
            })
            .sum();
        inner.row_group.estimated_mem_usage() + index_usage as u64
    }
}

fn as_id(value: &ScalarValue, table_id: TableId) -> StorageResult<InternalId> {
    value.as_internal_id().ok_or_else(|| {
        StorageError::ConsistencyViolation(format!(
            "staged key column of rel table {table_id} holds {value:?}"
        ))
    })
}

fn read_id(
    row_group: &ChunkedRowGroup,
    row_idx: RowIdx,
    column_id: ColumnId,
) -> StorageResult<InternalId> {
    let value = row_group.get(row_idx, column_id).ok_or_else(|| {
        StorageError::ConsistencyViolation(format!(
            "row {row_idx} missing from local rel table {}",
            row_group.table_id()
        ))
    })?;
    as_id(value, row_group.table_id())
}

#[cfg(test)]
mod tests {
    use ferngraph_catalog::entry::TableCatalogEntryKind;
    use ferngraph_catalog::property::PropertyDefinition;
    use ferngraph_transaction::Timestamp;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    const PERSON: TableId = 0;
    const KNOWS: TableId = 2;

    fn knows_table() -> LocalRelTable {
        let group = TableCatalogEntry::new(
            1,
            "knows",
            TableCatalogEntryKind::RelGroup {
                rel_table_ids: vec![KNOWS],
            },
            vec![PropertyDefinition::new("since", LogicalType::Int32, true)],
            Timestamp::SYSTEM,
        );
        LocalRelTable::new(KNOWS, &group, 1 << 20)
    }

    fn insert(table: &LocalRelTable, src: Offset, dst: Offset, since: i32) -> InternalId {
        let mut state = TableInsertState::rel(
            InternalId::new(src, PERSON),
            InternalId::new(dst, PERSON),
            vec![since.into()],
        );
        table.insert(&mut state).unwrap();
        state.inserted_id().unwrap()
    }

    fn delete(table: &LocalRelTable, src: Offset, dst: Offset, rel: Offset) -> bool {
        table
            .delete(&TableDeleteState::Rel(RelTableDeleteState {
                src_offset: src,
                dst_offset: dst,
                rel_offset: rel,
            }))
            .unwrap()
    }

    fn node(offset: Offset) -> [InternalId; 1] {
        [InternalId::new(offset, PERSON)]
    }

    fn collect(table: &LocalRelTable, mut state: LocalTableScanState) -> Vec<LocalScanBatch> {
        table.initialize_scan(&mut state).unwrap();
        let mut batches = Vec::new();
        while let Some(batch) = table.scan(&mut state).unwrap() {
            batches.push(batch);
        }
        batches
    }

    #[test]
    fn test_insert_assigns_local_rel_ids() {
        let table = knows_table();
        assert_eq!(
            insert(&table, 3, 7, 2020),
            InternalId::new(LOCAL_REL_OFFSET_START, KNOWS)
        );
        assert_eq!(
            insert(&table, 3, 8, 2021),
            InternalId::new(LOCAL_REL_OFFSET_START + 1, KNOWS)
        );
        assert!(table.check_if_node_has_rels(&node(3), RelDataDirection::Fwd));
        assert!(!table.check_if_node_has_rels(&node(7), RelDataDirection::Fwd));
        assert!(table.check_if_node_has_rels(&node(7), RelDataDirection::Bwd));
        assert!(!table.check_if_node_has_rels(&[], RelDataDirection::Fwd));
        table.check_consistency().unwrap();
    }

    #[test]
    fn test_delete_removes_row_from_both_directions() {
        let table = knows_table();
        let first = insert(&table, 3, 7, 2020);
        let second = insert(&table, 3, 7, 2021);

        assert!(!delete(&table, 3, 8, first.offset));
        assert!(!delete(&table, 3, 7, first.offset + 10));
        assert!(delete(&table, 3, 7, first.offset));
        assert!(!delete(&table, 3, 7, first.offset));
        table.check_consistency().unwrap();
        assert_eq!(table.num_live_rows(), 1);
        assert_eq!(table.num_rows(), 2);

        assert!(delete(&table, 3, 7, second.offset));
        assert!(table.is_empty());
        assert!(!table.check_if_node_has_rels(&node(3), RelDataDirection::Fwd));
        assert!(!table.check_if_node_has_rels(&node(7), RelDataDirection::Bwd));
    }

    #[test]
    fn test_update_finds_row_through_index() {
        let table = knows_table();
        let rel = insert(&table, 1, 2, 2020);
        let update = |rel_offset, column_id| {
            table.update(&TableUpdateState::Rel(RelTableUpdateState {
                src_offset: 1,
                dst_offset: 2,
                rel_offset,
                column_id,
                value: 1999i32.into(),
            }))
        };
        assert!(update(rel.offset, 2).unwrap());
        assert!(!update(rel.offset + 1, 2).unwrap());
        assert!(matches!(
            update(rel.offset, REL_ID_COLUMN_ID),
            Err(StorageError::ConsistencyViolation(_))
        ));

        let batches = collect(
            &table,
            LocalTableScanState::Rel(LocalRelTableScanState::for_bound_nodes(
                RelDataDirection::Fwd,
                vec![1],
                vec![2],
            )),
        );
        assert_eq!(batches[0].rows, vec![vec![ScalarValue::from(1999i32)]]);
    }

    #[test]
    fn test_scan_projects_durable_columns_per_direction() {
        let table = knows_table();
        let rel = insert(&table, 3, 7, 2020);

        let fwd = collect(
            &table,
            LocalTableScanState::Rel(LocalRelTableScanState::for_bound_nodes(
                RelDataDirection::Fwd,
                vec![3, 7],
                vec![],
            )),
        );
        assert_eq!(fwd.len(), 1);
        assert_eq!(fwd[0].bound_offset, Some(3));
        assert_eq!(fwd[0].ids, vec![rel]);
        assert_eq!(fwd[0].rows, vec![vec![
            ScalarValue::from(InternalId::new(7, PERSON)),
            ScalarValue::from(rel),
            ScalarValue::from(2020i32),
        ]]);

        let bwd = collect(
            &table,
            LocalTableScanState::Rel(LocalRelTableScanState::for_bound_nodes(
                RelDataDirection::Bwd,
                vec![7],
                vec![NBR_ID_COLUMN_ID],
            )),
        );
        assert_eq!(bwd[0].rows, vec![vec![ScalarValue::from(InternalId::new(
            3, PERSON
        ))]]);
    }

    #[test]
    fn test_scan_batches_are_capped_and_restartable() {
        let table = knows_table();
        let total = DEFAULT_VECTOR_CAPACITY as usize + 5;
        for i in 0..total {
            insert(&table, 0, i as Offset + 1, 0);
        }
        insert(&table, 9, 0, 0);

        let mut state = LocalTableScanState::Rel(LocalRelTableScanState::full(
            RelDataDirection::Fwd,
            vec![NBR_ID_COLUMN_ID],
        ));
        table.initialize_scan(&mut state).unwrap();
        let first = table.scan(&mut state).unwrap().unwrap();
        assert_eq!(first.len(), DEFAULT_VECTOR_CAPACITY as usize);
        assert_eq!(table.scan(&mut state).unwrap().unwrap().len(), 5);
        let last = table.scan(&mut state).unwrap().unwrap();
        assert_eq!(last.bound_offset, Some(9));
        assert!(table.scan(&mut state).unwrap().is_none());

        table.initialize_scan(&mut state).unwrap();
        assert_eq!(table.scan(&mut state).unwrap().unwrap(), first);
    }

    #[test]
    fn test_add_column_keeps_key_layout() {
        let table = knows_table();
        let rel = insert(&table, 3, 7, 2020);
        table
            .add_column(&AddColumnState {
                property: PropertyDefinition::new("weight", LogicalType::Float64, true),
                default_value: 1.5f64.into(),
            })
            .unwrap();
        let staged = table.staged_rows().unwrap();
        assert_eq!(staged[0].src, InternalId::new(3, PERSON));
        assert_eq!(staged[0].properties, vec![
            ScalarValue::from(2020i32),
            ScalarValue::from(1.5f64)
        ]);

        let batches = collect(
            &table,
            LocalTableScanState::Rel(LocalRelTableScanState::full(
                RelDataDirection::Fwd,
                vec![REL_ID_COLUMN_ID, 3],
            )),
        );
        assert_eq!(batches[0].rows, vec![vec![
            ScalarValue::from(rel),
            ScalarValue::from(1.5f64)
        ]]);
    }

    #[test]
    fn test_clear_twice_matches_clear_once() {
        let table = knows_table();
        insert(&table, 3, 7, 2020);
        insert(&table, 4, 7, 2020);
        table.clear();
        let once = (table.is_empty(), table.num_rows(), table.estimated_mem_usage());
        table.clear();
        let twice = (table.is_empty(), table.num_rows(), table.estimated_mem_usage());
        assert_eq!(once, (true, 0, 0));
        assert_eq!(once, twice);
        assert_eq!(
            insert(&table, 1, 2, 0),
            InternalId::new(LOCAL_REL_OFFSET_START, KNOWS)
        );
    }

    #[test]
    fn test_random_inserts_and_deletes_keep_directions_in_sync() {
        let table = knows_table();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut live: Vec<(Offset, Offset, Offset)> = Vec::new();
        for _ in 0..2_000 {
            if live.is_empty() || rng.random_bool(0.6) {
                let src = rng.random_range(0..32);
                let dst = rng.random_range(0..32);
                let rel = insert(&table, src, dst, 0);
                live.push((src, dst, rel.offset));
            } else {
                let (src, dst, rel) = live.swap_remove(rng.random_range(0..live.len()));
                assert!(delete(&table, src, dst, rel));
            }
            table.check_consistency().unwrap();
            let inner = table.inner.read();
            let [fwd, bwd] = &inner.directed_indices;
            assert_eq!(fwd.is_empty(), bwd.is_empty());
            assert_eq!(fwd.num_rows(), live.len());
        }
    }
}
