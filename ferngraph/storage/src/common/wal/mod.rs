pub mod graph_wal;

use std::fmt::Debug;
use std::path::Path;

use crate::error::StorageResult;

/// A record framed into the log. Records are ordered by their log sequence number.
pub trait LogRecord: Clone + Debug + Sized {
    fn lsn(&self) -> u64;

    fn to_bytes(&self) -> StorageResult<Vec<u8>>;

    fn from_bytes(bytes: Vec<u8>) -> StorageResult<Self>;
}

/// Append-only log of [`LogRecord`]s backed by a single file.
pub trait StorageWal: Sized {
    type Record: LogRecord;

    type LogIterator: Iterator<Item = StorageResult<Self::Record>>;

    /// Opens the log at `path`, creating it and its parent directories when missing.
    fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self>;

    /// Buffers one record. Nothing is durable before [`StorageWal::flush`].
    fn append(&mut self, record: &Self::Record) -> StorageResult<()>;

    /// Writes out buffered records and syncs the file.
    fn flush(&mut self) -> StorageResult<()>;

    /// Replays flushed records in file order.
    fn iter(&self) -> StorageResult<Self::LogIterator>;

    /// Every flushed record in LSN order. A corrupt record fails the whole read.
    fn read_all(&self) -> StorageResult<Vec<Self::Record>> {
        let mut records = self.iter()?.collect::<StorageResult<Vec<_>>>()?;
        records.sort_by_key(|record| record.lsn());
        Ok(records)
    }

    /// Drops every record whose LSN is below `min_lsn`.
    fn truncate_until(&mut self, min_lsn: u64) -> StorageResult<()>;
}
