use ferngraph_common::types::TableId;
use ferngraph_transaction::Timestamp;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("table catalog entry {0} not found")]
    NotFound(TableId),

    #[error("table catalog entry {table_id} created at {created_ts} is not visible at {read_ts}")]
    NotVisible {
        table_id: TableId,
        created_ts: Timestamp,
        read_ts: Timestamp,
    },

    #[error("table `{0}` already exists")]
    Duplicate(String),

    #[error("table {0} is not a node table")]
    NotNodeTable(TableId),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
