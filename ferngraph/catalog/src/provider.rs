use std::fmt::Debug;
use std::sync::Arc;

use ferngraph_common::types::TableId;
use ferngraph_transaction::Timestamp;

use crate::entry::TableCatalogEntry;
use crate::error::CatalogResult;

pub type CatalogRef = Arc<dyn CatalogProvider>;
pub type TableCatalogEntryRef = Arc<TableCatalogEntry>;

/// Schema lookup consumed by the storage layer.
pub trait CatalogProvider: Debug + Send + Sync {
    /// Retrieves the entry of a node table, rel table or rel group as seen at `read_ts`.
    ///
    /// Entries created after `read_ts` are reported as not visible.
    fn get_table_catalog_entry(
        &self,
        read_ts: Timestamp,
        table_id: TableId,
    ) -> CatalogResult<TableCatalogEntryRef>;

    /// Returns the ids of every table known to the catalog, in ascending order.
    fn table_ids(&self) -> Vec<TableId>;
}
