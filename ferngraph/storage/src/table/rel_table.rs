use std::any::Any;
use std::sync::Arc;

use crossbeam_skiplist::SkipSet;
use ferngraph_catalog::entry::{TableCatalogEntry, TableCatalogEntryKind};
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{
    ColumnId, InternalId, Offset, RelDataDirection, TableId, TableType,
};
use ferngraph_common::value::ScalarValue;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::node_table::NodeTable;
use super::{Table, TableSnapshot};
use crate::common::row_group::ChunkedRowGroup;
use crate::error::{StorageError, StorageResult};
use crate::local_storage::local_rel_table::{
    LOCAL_BOUND_NODE_ID_COLUMN_ID, LOCAL_NBR_NODE_ID_COLUMN_ID, LOCAL_NUM_KEY_COLUMNS,
    LOCAL_REL_ID_COLUMN_ID,
};
use crate::local_storage::local_table::LocalTable;
use crate::tp::transaction::Transaction;

/// Column of the neighbour node id in the durable rel layout.
pub const NBR_ID_COLUMN_ID: ColumnId = 0;
/// Column of the rel id in the durable rel layout.
pub const REL_ID_COLUMN_ID: ColumnId = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelRow {
    pub src: Offset,
    pub dst: Offset,
    pub properties: Vec<ScalarValue>,
}

/// One relationship seen from a bound node.
#[derive(Debug, Clone, PartialEq)]
pub struct RelScanRow {
    pub nbr: InternalId,
    pub rel_id: InternalId,
    pub properties: Vec<ScalarValue>,
}

/// Durable relationships of one `(src table, dst table)` pair of a rel group.
///
/// Rows are stored densely by rel offset. Each direction keeps an ordered set of
/// `(bound offset, rel offset)` pairs.
#[derive(Debug)]
pub struct RelTable {
    table_id: TableId,
    rel_group_id: TableId,
    src_table_id: TableId,
    dst_table_id: TableId,
    property_types: Vec<LogicalType>,
    rows: RwLock<Vec<RelRow>>,
    adjacency: [SkipSet<(Offset, Offset)>; 2],
}

impl RelTable {
    pub fn new(entry: &TableCatalogEntry) -> StorageResult<Self> {
        let TableCatalogEntryKind::Rel {
            rel_group_id,
            src_table_id,
            dst_table_id,
        } = *entry.kind()
        else {
            return Err(StorageError::TypeMismatch {
                expected: "rel table entry".to_string(),
                actual: format!("{:?}", entry.kind()),
            });
        };
        Ok(Self::from_rows(
            entry.id(),
            rel_group_id,
            src_table_id,
            dst_table_id,
            entry.properties().iter().map(|p| p.logical_type()).collect(),
            Vec::new(),
        ))
    }

    pub(crate) fn from_rows(
        table_id: TableId,
        rel_group_id: TableId,
        src_table_id: TableId,
        dst_table_id: TableId,
        property_types: Vec<LogicalType>,
        rows: Vec<RelRow>,
    ) -> Self {
        let table = Self {
            table_id,
            rel_group_id,
            src_table_id,
            dst_table_id,
            property_types,
            rows: RwLock::new(Vec::new()),
            adjacency: [SkipSet::new(), SkipSet::new()],
        };
        {
            let mut guard = table.rows.write();
            table.append_rows(&mut guard, rows);
        }
        table
    }

    #[inline]
    pub fn rel_group_id(&self) -> TableId {
        self.rel_group_id
    }

    #[inline]
    pub fn src_table_id(&self) -> TableId {
        self.src_table_id
    }

    #[inline]
    pub fn dst_table_id(&self) -> TableId {
        self.dst_table_id
    }

    #[inline]
    pub fn property_types(&self) -> &[LogicalType] {
        &self.property_types
    }

    fn nbr_table_id(&self, direction: RelDataDirection) -> TableId {
        match direction {
            RelDataDirection::Fwd => self.dst_table_id,
            RelDataDirection::Bwd => self.src_table_id,
        }
    }

    /// Relationships of `bound_offset` in `direction`, ordered by rel offset.
    pub fn scan_bound_node(
        &self,
        direction: RelDataDirection,
        bound_offset: Offset,
    ) -> Vec<RelScanRow> {
        let rows = self.rows.read();
        let nbr_table_id = self.nbr_table_id(direction);
        self.adjacency[direction.idx()]
            .range((bound_offset, 0)..=(bound_offset, Offset::MAX))
            .filter_map(|entry| {
                let (_, rel_offset) = *entry.value();
                let row = rows.get(rel_offset as usize)?;
                let nbr = match direction {
                    RelDataDirection::Fwd => row.dst,
                    RelDataDirection::Bwd => row.src,
                };
                Some(RelScanRow {
                    nbr: InternalId::new(nbr, nbr_table_id),
                    rel_id: InternalId::new(rel_offset, self.table_id),
                    properties: row.properties.clone(),
                })
            })
            .collect()
    }

    pub fn check_if_node_has_rels(
        &self,
        node_ids: &[InternalId],
        direction: RelDataDirection,
    ) -> bool {
        let index = &self.adjacency[direction.idx()];
        node_ids.iter().any(|id| {
            index
                .range((id.offset, 0)..=(id.offset, Offset::MAX))
                .next()
                .is_some()
        })
    }

    /// Appends rows produced outside a transaction, such as a finalized in-memory graph.
    ///
    /// `row_group` uses the local rel layout `[bound, nbr, rel_id, properties…]` in the forward
    /// direction, with rel ids continuing densely from [`Table::num_rows`]. Missing trailing
    /// properties are filled with typed nulls.
    pub fn bulk_append(&self, row_group: &ChunkedRowGroup) -> StorageResult<u64> {
        if row_group.num_columns() > LOCAL_NUM_KEY_COLUMNS + self.property_types.len() {
            return Err(StorageError::TypeMismatch {
                expected: format!(
                    "at most {} columns",
                    LOCAL_NUM_KEY_COLUMNS + self.property_types.len()
                ),
                actual: format!("{} columns", row_group.num_columns()),
            });
        }

        let mut rows = self.rows.write();
        let first_offset = rows.len() as Offset;
        let mut new_rows = Vec::with_capacity(row_group.num_rows() as usize);
        for row_idx in 0..row_group.num_rows() {
            let id_at = |column_id| {
                row_group
                    .get(row_idx, column_id)
                    .and_then(ScalarValue::as_internal_id)
                    .ok_or_else(|| {
                        StorageError::ConsistencyViolation(format!(
                            "bulk row {row_idx} of rel table {} lacks a key in column {column_id}",
                            self.table_id
                        ))
                    })
            };
            let src = id_at(LOCAL_BOUND_NODE_ID_COLUMN_ID)?;
            let dst = id_at(LOCAL_NBR_NODE_ID_COLUMN_ID)?;
            let rel_id = id_at(LOCAL_REL_ID_COLUMN_ID)?;
            let expected = InternalId::new(first_offset + row_idx, self.table_id);
            if rel_id != expected {
                return Err(StorageError::ConsistencyViolation(format!(
                    "bulk row {row_idx} carries rel id {rel_id}, expected {expected}"
                )));
            }
            if src.table_id != self.src_table_id || dst.table_id != self.dst_table_id {
                return Err(StorageError::ConsistencyViolation(format!(
                    "bulk row {row_idx} connects {src} to {dst} outside rel table {}",
                    self.table_id
                )));
            }
            let properties = self
                .property_types
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    row_group
                        .get(row_idx, (LOCAL_NUM_KEY_COLUMNS + i) as ColumnId)
                        .cloned()
                        .unwrap_or_else(|| ScalarValue::null_of(*ty))
                })
                .collect();
            new_rows.push(RelRow {
                src: src.offset,
                dst: dst.offset,
                properties,
            });
        }
        let num_rows = new_rows.len() as u64;
        self.append_rows(&mut rows, new_rows);
        debug!(table_id = self.table_id, num_rows, "bulk appended rel rows");
        Ok(num_rows)
    }

    fn append_rows(&self, rows: &mut Vec<RelRow>, new_rows: Vec<RelRow>) {
        for row in new_rows {
            let rel_offset = rows.len() as Offset;
            self.adjacency[RelDataDirection::Fwd.idx()].insert((row.src, rel_offset));
            self.adjacency[RelDataDirection::Bwd.idx()].insert((row.dst, rel_offset));
            rows.push(row);
        }
    }

    fn check_endpoint(
        &self,
        id: InternalId,
        expected_table_id: TableId,
        node_table: &NodeTable,
    ) -> StorageResult<()> {
        if id.table_id == expected_table_id && node_table.contains_node(id.offset) {
            Ok(())
        } else {
            Err(StorageError::ConsistencyViolation(format!(
                "rel table {} references {id}, which is not a committed node of table \
                 {expected_table_id}",
                self.table_id
            )))
        }
    }
}

impl Table for RelTable {
    #[inline]
    fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    fn table_type(&self) -> TableType {
        TableType::Rel
    }

    #[inline]
    fn catalog_entry_id(&self) -> TableId {
        self.rel_group_id
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
        let local = local_table.as_rel().ok_or_else(|| {
            StorageError::ConsistencyViolation(format!(
                "rel table {} received a node local table",
                self.table_id
            ))
        })?;
        if entry.properties().len() != self.property_types.len() {
            return Err(StorageError::TypeMismatch {
                expected: format!("{} properties", self.property_types.len()),
                actual: format!("{} properties in {}", entry.properties().len(), entry.name()),
            });
        }
        local.check_consistency()?;
        let staged = local.staged_rows()?;

        // Node tables commit first, so every endpoint must already be durable.
        let storage = txn.context().storage_manager();
        let src_table = storage.get_node_table(self.src_table_id)?;
        let dst_table = storage.get_node_table(self.dst_table_id)?;
        for row in &staged {
            self.check_endpoint(row.src, self.src_table_id, &src_table)?;
            self.check_endpoint(row.dst, self.dst_table_id, &dst_table)?;
            if row.properties.len() != self.property_types.len() {
                return Err(StorageError::TypeMismatch {
                    expected: format!("{} properties", self.property_types.len()),
                    actual: format!("{} values", row.properties.len()),
                });
            }
        }

        let num_rows = staged.len() as u64;
        let mut rows = self.rows.write();
        self.append_rows(
            &mut rows,
            staged
                .into_iter()
                .map(|row| RelRow {
                    src: row.src.offset,
                    dst: row.dst.offset,
                    properties: row.properties,
                })
                .collect(),
        );
        debug!(
            table_id = self.table_id,
            txn_id = %txn.txn_id(),
            num_rows,
            "committed rel rows"
        );
        Ok(num_rows)
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot::Rel {
            table_id: self.table_id,
            rel_group_id: self.rel_group_id,
            src_table_id: self.src_table_id,
            dst_table_id: self.dst_table_id,
            property_types: self.property_types.clone(),
            rows: self.rows.read().clone(),
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
