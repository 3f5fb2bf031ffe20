use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use ferngraph_common::types::{TableId, TableType};
use ferngraph_transaction::Timestamp;
use parking_lot::RwLock;

use crate::entry::{TableCatalogEntry, TableCatalogEntryKind};
use crate::error::{CatalogError, CatalogResult};
use crate::property::PropertyDefinition;
use crate::provider::{CatalogProvider, TableCatalogEntryRef};

#[derive(Debug, Default)]
struct CatalogInner {
    next_table_id: TableId,
    names: HashMap<String, TableId>,
    entries: HashMap<TableId, TableCatalogEntryRef>,
}

/// An in-memory catalog of node tables and rel groups.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: RwLock<CatalogInner>,
}

impl MemoryCatalog {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node_table(
        &self,
        name: &str,
        properties: Vec<PropertyDefinition>,
        created_ts: Timestamp,
    ) -> CatalogResult<TableId> {
        let mut inner = self.inner.write();
        let id = inner.reserve_name(name)?;
        inner.entries.insert(
            id,
            Arc::new(TableCatalogEntry::new(
                id,
                name,
                TableCatalogEntryKind::Node,
                properties,
                created_ts,
            )),
        );
        Ok(id)
    }

    /// Creates a rel group connecting every `(src, dst)` pair in `connections`.
    ///
    /// Each pair gets its own rel table named `{name}_{src}_{dst}`. Returns the group id
    /// followed by the rel table ids in the order of `connections`.
    pub fn create_rel_group(
        &self,
        name: &str,
        connections: &[(TableId, TableId)],
        properties: Vec<PropertyDefinition>,
        created_ts: Timestamp,
    ) -> CatalogResult<(TableId, Vec<TableId>)> {
        let mut inner = self.inner.write();
        for &(src, dst) in connections {
            inner.expect_node_table(src)?;
            inner.expect_node_table(dst)?;
        }
        let group_id = inner.reserve_name(name)?;
        let mut rel_table_ids = Vec::with_capacity(connections.len());
        for &(src, dst) in connections {
            let rel_name = format!("{name}_{src}_{dst}");
            let rel_id = inner.reserve_name(&rel_name)?;
            inner.entries.insert(
                rel_id,
                Arc::new(TableCatalogEntry::new(
                    rel_id,
                    rel_name,
                    TableCatalogEntryKind::Rel {
                        rel_group_id: group_id,
                        src_table_id: src,
                        dst_table_id: dst,
                    },
                    properties.clone(),
                    created_ts,
                )),
            );
            rel_table_ids.push(rel_id);
        }
        inner.entries.insert(
            group_id,
            Arc::new(TableCatalogEntry::new(
                group_id,
                name,
                TableCatalogEntryKind::RelGroup {
                    rel_table_ids: rel_table_ids.clone(),
                },
                properties,
                created_ts,
            )),
        );
        Ok((group_id, rel_table_ids))
    }

    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        self.inner.read().names.get(name).copied()
    }
}

impl CatalogInner {
    fn reserve_name(&mut self, name: &str) -> CatalogResult<TableId> {
        match self.names.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CatalogError::Duplicate(name.to_string())),
            Entry::Vacant(e) => {
                let id = self.next_table_id;
                self.next_table_id += 1;
                e.insert(id);
                Ok(id)
            }
        }
    }

    fn expect_node_table(&self, id: TableId) -> CatalogResult<()> {
        match self.entries.get(&id) {
            Some(entry) if entry.table_type() == TableType::Node => Ok(()),
            Some(_) => Err(CatalogError::NotNodeTable(id)),
            None => Err(CatalogError::NotFound(id)),
        }
    }
}

impl CatalogProvider for MemoryCatalog {
    fn get_table_catalog_entry(
        &self,
        read_ts: Timestamp,
        table_id: TableId,
    ) -> CatalogResult<TableCatalogEntryRef> {
        let inner = self.inner.read();
        let entry = inner
            .entries
            .get(&table_id)
            .ok_or(CatalogError::NotFound(table_id))?;
        if entry.created_ts() > read_ts {
            return Err(CatalogError::NotVisible {
                table_id,
                created_ts: entry.created_ts(),
                read_ts,
            });
        }
        Ok(entry.clone())
    }

    fn table_ids(&self) -> Vec<TableId> {
        let mut ids: Vec<_> = self.inner.read().entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
