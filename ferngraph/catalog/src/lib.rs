pub mod entry;
pub mod error;
pub mod memory;
pub mod property;
pub mod provider;
