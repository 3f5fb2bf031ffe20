use std::sync::Arc;

use ferngraph_catalog::provider::CatalogRef;

use crate::common::wal::graph_wal::WalManager;
use crate::storage_manager::StorageManager;

/// Handles shared by every transaction of a database.
pub struct StorageContext {
    catalog: CatalogRef,
    storage_manager: Arc<StorageManager>,
    wal_manager: Arc<WalManager>,
}

impl StorageContext {
    pub fn new(
        catalog: CatalogRef,
        storage_manager: Arc<StorageManager>,
        wal_manager: Arc<WalManager>,
    ) -> Self {
        Self {
            catalog,
            storage_manager,
            wal_manager,
        }
    }

    #[inline]
    pub fn catalog(&self) -> &CatalogRef {
        &self.catalog
    }

    #[inline]
    pub fn storage_manager(&self) -> &Arc<StorageManager> {
        &self.storage_manager
    }

    #[inline]
    pub fn wal_manager(&self) -> &Arc<WalManager> {
        &self.wal_manager
    }
}
