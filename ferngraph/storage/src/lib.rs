pub mod common;
pub mod context;
pub mod error;
pub mod graph_index;
pub mod local_storage;
pub mod storage_manager;
pub mod table;
pub mod tp;

pub use context::StorageContext;
pub use error::{StorageError, StorageResult};
pub use local_storage::{LocalStorage, LocalStorageConfig};
pub use storage_manager::StorageManager;
pub use table::{Table, TableRef};
pub use tp::{Transaction, TransactionManager, TransactionManagerConfig};
