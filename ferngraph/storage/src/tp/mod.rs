pub mod checkpoint;
pub mod transaction;
pub mod txn_manager;

pub use checkpoint::{CheckpointConfig, Checkpointer, CheckpointerFactory, SnapshotCheckpointer};
pub use transaction::{InterruptHandle, Transaction};
pub use txn_manager::{TransactionManager, TransactionManagerConfig};
