// Append-only redo log recording transaction boundaries and per-table commits.
//
// Log record layout (little-endian):
// ┌────────────┬────────────┬───────────┐
// │ u32 len    │ u32 crc32  │ payload…  │
// └────────────┴────────────┴───────────┘
// - `len`    : number of bytes in payload
// - `crc32`  : checksum of payload for corruption detection
//
// A transaction is durable once its `CommitTransaction` record has been flushed. Replay
// discards every transaction lacking one.
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crc32fast::Hasher;
use ferngraph_common::types::{TableId, TableType};
use ferngraph_transaction::Timestamp;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{LogRecord, StorageWal};
use crate::error::{StorageError, StorageResult, WalError};

const HEADER_SIZE: usize = 8; // 4 bytes length + 4 bytes crc32

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedoEntry {
    pub lsn: u64,          // Log sequence number
    pub txn_id: Timestamp, // Transaction ID
    pub op: Operation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    BeginTransaction(Timestamp), // transaction start timestamp
    TableCommitted {
        table_id: TableId,
        table_type: TableType,
        num_rows: u64,
    },
    CommitTransaction(Timestamp), // transaction commit timestamp
    RollbackTransaction,
    /// Everything before `lsn` is captured by a snapshot.
    Checkpoint { lsn: u64 },
}

impl LogRecord for RedoEntry {
    #[inline]
    fn lsn(&self) -> u64 {
        self.lsn
    }

    fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        postcard::to_allocvec(self)
            .map_err(|e| StorageError::Wal(WalError::SerializationFailed(e.to_string())))
    }

    fn from_bytes(bytes: Vec<u8>) -> StorageResult<Self> {
        postcard::from_bytes(&bytes)
            .map_err(|e| StorageError::Wal(WalError::DeserializationFailed(e.to_string())))
    }
}

/// Write-ahead log in append-only mode.
pub struct GraphWal {
    file: BufWriter<File>,
    path: PathBuf,
}

/// Streams framed records from the start of a log file.
///
/// Iteration stops after the first error, since the framing of everything behind a
/// corrupt record is unknown.
pub struct WalIterator<R> {
    reader: BufReader<File>,
    done: bool,
    _record: PhantomData<R>,
}

impl<R: LogRecord> WalIterator<R> {
    fn read_next(&mut self) -> Option<StorageResult<R>> {
        let mut header = [0u8; HEADER_SIZE];
        if let Err(e) = self.reader.read_exact(&mut header) {
            // Normal EOF – stop iteration
            if e.kind() == io::ErrorKind::UnexpectedEof {
                return None;
            }
            return Some(Err(StorageError::Wal(WalError::Io(e))));
        }

        let [l0, l1, l2, l3, c0, c1, c2, c3] = header;
        let len = u32::from_le_bytes([l0, l1, l2, l3]) as usize;
        let checksum = u32::from_le_bytes([c0, c1, c2, c3]);

        let mut payload = vec![0u8; len];
        if let Err(e) = self.reader.read_exact(&mut payload) {
            return Some(Err(StorageError::Wal(WalError::Io(e))));
        }

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        if hasher.finalize() != checksum {
            return Some(Err(StorageError::Wal(WalError::ChecksumMismatch)));
        }

        Some(R::from_bytes(payload))
    }
}

impl<R: LogRecord> Iterator for WalIterator<R> {
    type Item = StorageResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read_next();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl StorageWal for GraphWal {
    type LogIterator = WalIterator<RedoEntry>;
    type Record = RedoEntry;

    /// Open existing log or create a new one at `path`.
    fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Wal(WalError::Io(e)))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .read(true)
            .open(&path)
            .map_err(|e| StorageError::Wal(WalError::Io(e)))?;

        file.seek(SeekFrom::End(0))
            .map_err(|e| StorageError::Wal(WalError::Io(e)))?;

        Ok(Self {
            file: BufWriter::new(file),
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Append a record and buffer it. Call `flush` to fsync.
    ///
    /// The whole frame is written in one call. If the write fails, the file is truncated back
    /// to its previous length so that no partial frame is left behind.
    fn append(&mut self, record: &Self::Record) -> StorageResult<()> {
        let payload = record.to_bytes()?;
        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let checksum = hasher.finalize();
        let len = payload.len() as u32;

        let original_pos = self
            .file
            .stream_position()
            .map_err(|e| StorageError::Wal(WalError::Io(e)))?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len());
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&checksum.to_le_bytes());
        data.extend_from_slice(&payload);

        match self.file.write_all(&data) {
            Ok(_) => Ok(()),
            Err(e) => {
                self.file
                    .seek(SeekFrom::Start(original_pos))
                    .map_err(|e| StorageError::Wal(WalError::Io(e)))?;
                self.file
                    .get_ref()
                    .set_len(original_pos)
                    .map_err(|e| StorageError::Wal(WalError::Io(e)))?;
                Err(StorageError::Wal(WalError::Io(e)))
            }
        }
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file
            .flush()
            .map_err(|e| StorageError::Wal(WalError::Io(e)))?;
        self.file
            .get_ref()
            .sync_data()
            .map_err(|e| StorageError::Wal(WalError::Io(e)))
    }

    /// Returns an iterator over the records in the file, verifying each checksum.
    ///
    /// The reader uses its own file handle, so records still sitting in the write buffer are
    /// not visible until [`Self::flush`] is called.
    fn iter(&self) -> StorageResult<Self::LogIterator> {
        let reader = File::open(&self.path).map_err(|e| StorageError::Wal(WalError::Io(e)))?;

        Ok(WalIterator {
            reader: BufReader::new(reader),
            done: false,
            _record: PhantomData,
        })
    }

    /// Rewrites the log keeping only records with `lsn >= min_lsn`.
    fn truncate_until(&mut self, min_lsn: u64) -> StorageResult<()> {
        self.flush()?;
        let retained: Vec<_> = self
            .read_all()?
            .into_iter()
            .filter(|e| e.lsn >= min_lsn)
            .collect();

        fs::remove_file(&self.path).map_err(|e| StorageError::Wal(WalError::Io(e)))?;
        let mut new_wal = GraphWal::open(&self.path)?;
        for record in &retained {
            new_wal.append(record)?;
        }
        new_wal.flush()?;

        self.file = new_wal.file;
        Ok(())
    }
}

impl GraphWal {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone)]
pub struct WalManagerConfig {
    pub wal_path: PathBuf,
}

fn default_wal_path() -> PathBuf {
    const FILE_NAME: &str = "ferngraph-wal.log";
    match temp_dir::TempDir::new() {
        Ok(tmp_dir) => {
            let path = tmp_dir.path().join(FILE_NAME);
            tmp_dir.leak();
            path
        }
        Err(_) => std::env::temp_dir().join(format!("{}-{FILE_NAME}", Uuid::new_v4())),
    }
}

impl Default for WalManagerConfig {
    fn default() -> Self {
        Self {
            wal_path: default_wal_path(),
        }
    }
}

/// Owns the log file and hands out log sequence numbers.
pub struct WalManager {
    wal: Mutex<GraphWal>,
    next_lsn: AtomicU64,
}

impl WalManager {
    /// Opens the log and resumes LSN assignment after the last record found in it.
    pub fn new(config: WalManagerConfig) -> StorageResult<Self> {
        let wal = GraphWal::open(&config.wal_path)?;
        let next_lsn = wal.read_all()?.last().map_or(0, |e| e.lsn + 1);
        Ok(Self {
            wal: Mutex::new(wal),
            next_lsn: AtomicU64::new(next_lsn),
        })
    }

    #[inline]
    pub fn next_lsn(&self) -> u64 {
        self.next_lsn.fetch_add(1, Ordering::SeqCst)
    }

    /// Appends `op` on behalf of `txn_id` and returns the assigned LSN.
    pub fn log(&self, txn_id: Timestamp, op: Operation) -> StorageResult<u64> {
        let mut wal = self.wal.lock();
        let lsn = self.next_lsn();
        wal.append(&RedoEntry { lsn, txn_id, op })?;
        Ok(lsn)
    }

    /// Appends a checkpoint record carrying its own LSN and returns that LSN.
    pub fn log_checkpoint(&self) -> StorageResult<u64> {
        let mut wal = self.wal.lock();
        let lsn = self.next_lsn();
        wal.append(&RedoEntry {
            lsn,
            txn_id: Timestamp::SYSTEM,
            op: Operation::Checkpoint { lsn },
        })?;
        Ok(lsn)
    }

    pub fn flush(&self) -> StorageResult<()> {
        self.wal.lock().flush()
    }

    pub fn read_all(&self) -> StorageResult<Vec<RedoEntry>> {
        let mut wal = self.wal.lock();
        wal.flush()?;
        wal.read_all()
    }

    pub fn truncate_until(&self, lsn: u64) -> StorageResult<()> {
        self.wal.lock().truncate_until(lsn)
    }

    pub fn path(&self) -> PathBuf {
        self.wal.lock().path().to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_wal() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wal");
        (dir, path)
    }

    fn txn(n: u64) -> Timestamp {
        Timestamp::with_ts(Timestamp::TXN_ID_START + n)
    }

    #[test]
    fn test_append_and_read_sorted_by_lsn() {
        let (_dir, path) = temp_wal();
        let mut wal = GraphWal::open(&path).unwrap();
        wal.append(&RedoEntry {
            lsn: 2,
            txn_id: txn(1),
            op: Operation::CommitTransaction(Timestamp::with_ts(2)),
        })
        .unwrap();
        wal.append(&RedoEntry {
            lsn: 1,
            txn_id: txn(1),
            op: Operation::TableCommitted {
                table_id: 0,
                table_type: TableType::Node,
                num_rows: 3,
            },
        })
        .unwrap();
        wal.flush().unwrap();

        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].lsn, 1);
        assert!(matches!(
            records[0].op,
            Operation::TableCommitted { num_rows: 3, .. }
        ));
        assert_eq!(
            records[1].op,
            Operation::CommitTransaction(Timestamp::with_ts(2))
        );
    }

    #[test]
    fn test_corrupted_payload_detected() {
        let (_dir, path) = temp_wal();
        {
            let mut wal = GraphWal::open(&path).unwrap();
            wal.append(&RedoEntry {
                lsn: 0,
                txn_id: txn(1),
                op: Operation::RollbackTransaction,
            })
            .unwrap();
            wal.flush().unwrap();
        }
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let wal = GraphWal::open(&path).unwrap();
        let mut iter = wal.iter().unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(StorageError::Wal(WalError::ChecksumMismatch)))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_truncate_until() {
        let (_dir, path) = temp_wal();
        let mut wal = GraphWal::open(&path).unwrap();
        for lsn in 0..5 {
            wal.append(&RedoEntry {
                lsn,
                txn_id: txn(lsn),
                op: Operation::RollbackTransaction,
            })
            .unwrap();
        }
        wal.truncate_until(3).unwrap();
        let lsns: Vec<_> = wal.read_all().unwrap().iter().map(|e| e.lsn).collect();
        assert_eq!(lsns, vec![3, 4]);

        wal.append(&RedoEntry {
            lsn: 5,
            txn_id: txn(5),
            op: Operation::RollbackTransaction,
        })
        .unwrap();
        wal.flush().unwrap();
        assert_eq!(wal.read_all().unwrap().len(), 3);
    }

    #[test]
    fn test_manager_resumes_lsn() {
        let (_dir, path) = temp_wal();
        {
            let manager = WalManager::new(WalManagerConfig {
                wal_path: path.clone(),
            })
            .unwrap();
            assert_eq!(
                manager
                    .log(txn(1), Operation::BeginTransaction(Timestamp::with_ts(2)))
                    .unwrap(),
                0
            );
            assert_eq!(
                manager
                    .log(txn(1), Operation::CommitTransaction(Timestamp::with_ts(2)))
                    .unwrap(),
                1
            );
            manager.flush().unwrap();
        }
        let manager = WalManager::new(WalManagerConfig { wal_path: path }).unwrap();
        assert_eq!(manager.next_lsn(), 2);
    }
}
