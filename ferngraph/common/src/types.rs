use std::fmt;

use serde::{Deserialize, Serialize};

/// Internal identifier associated with a table or a rel group (database-wide unique).
pub type TableId = u64;

/// Position of a node or relationship inside its table.
pub type Offset = u64;

/// Position of a row inside a row group.
pub type RowIdx = u64;

/// Position of a column inside a table or a row group.
pub type ColumnId = u32;

/// Ordinal of a node group, see [`crate::constants::NODE_GROUP_SIZE`].
pub type NodeGroupIdx = u64;

pub const INVALID_OFFSET: Offset = Offset::MAX;
pub const INVALID_ROW_IDX: RowIdx = RowIdx::MAX;

/// Identifies a node or relationship as `(offset, table)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct InternalId {
    pub offset: Offset,
    pub table_id: TableId,
}

impl InternalId {
    #[inline]
    pub fn new(offset: Offset, table_id: TableId) -> Self {
        Self { offset, table_id }
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.table_id, self.offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TableType {
    Node,
    Rel,
}

/// Direction in which relationships are stored and traversed.
///
/// `Fwd` keys relationships by their source (bound) node, `Bwd` by their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelDataDirection {
    Fwd,
    Bwd,
}

impl RelDataDirection {
    pub const ALL: [RelDataDirection; 2] = [RelDataDirection::Fwd, RelDataDirection::Bwd];

    #[inline]
    pub fn idx(self) -> usize {
        match self {
            RelDataDirection::Fwd => 0,
            RelDataDirection::Bwd => 1,
        }
    }

    #[inline]
    pub fn reverse(self) -> Self {
        match self {
            RelDataDirection::Fwd => RelDataDirection::Bwd,
            RelDataDirection::Bwd => RelDataDirection::Fwd,
        }
    }
}
