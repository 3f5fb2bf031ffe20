use ferngraph_common::types::{TableId, TableType};
use ferngraph_transaction::Timestamp;
use serde::{Deserialize, Serialize};

use crate::property::PropertyDefinition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableCatalogEntryKind {
    Node,
    /// One physical rel table, connecting exactly one pair of node tables.
    Rel {
        rel_group_id: TableId,
        src_table_id: TableId,
        dst_table_id: TableId,
    },
    /// Groups the rel tables sharing a name and property schema.
    RelGroup { rel_table_ids: Vec<TableId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCatalogEntry {
    id: TableId,
    name: String,
    kind: TableCatalogEntryKind,
    properties: Vec<PropertyDefinition>,
    created_ts: Timestamp,
}

impl TableCatalogEntry {
    #[inline]
    pub fn new(
        id: TableId,
        name: impl Into<String>,
        kind: TableCatalogEntryKind,
        properties: Vec<PropertyDefinition>,
        created_ts: Timestamp,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            properties,
            created_ts,
        }
    }

    #[inline]
    pub fn id(&self) -> TableId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> &TableCatalogEntryKind {
        &self.kind
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    #[inline]
    pub fn created_ts(&self) -> Timestamp {
        self.created_ts
    }

    /// Rel tables and rel groups both store relationships.
    #[inline]
    pub fn table_type(&self) -> TableType {
        match self.kind {
            TableCatalogEntryKind::Node => TableType::Node,
            TableCatalogEntryKind::Rel { .. } | TableCatalogEntryKind::RelGroup { .. } => {
                TableType::Rel
            }
        }
    }

    /// Returns the rel group owning this rel table, if it is one.
    #[inline]
    pub fn rel_group_id(&self) -> Option<TableId> {
        match self.kind {
            TableCatalogEntryKind::Rel { rel_group_id, .. } => Some(rel_group_id),
            _ => None,
        }
    }

    /// Returns `(src, dst)` node table ids for a rel table.
    #[inline]
    pub fn bound_node_tables(&self) -> Option<(TableId, TableId)> {
        match self.kind {
            TableCatalogEntryKind::Rel {
                src_table_id,
                dst_table_id,
                ..
            } => Some((src_table_id, dst_table_id)),
            _ => None,
        }
    }

    #[inline]
    pub fn get_property(&self, name: &str) -> Option<(usize, &PropertyDefinition)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name() == name)
    }
}
