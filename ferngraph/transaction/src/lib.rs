//! Transaction identity and lifecycle contracts for the ferngraph storage engine.
//!
//! This crate only defines the identifiers, generators and traits shared by the catalog
//! and storage layers. The storage crate owns the concrete transaction and its manager.

pub mod error;
pub mod manager;
pub mod timestamp;
pub mod transaction;

pub use error::TimestampError;
pub use manager::GraphTxnManager;
pub use timestamp::{Timestamp, TimestampGenerator, TransactionIdGenerator};
pub use transaction::{Transaction, TransactionState, TransactionType};
