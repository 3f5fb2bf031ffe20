use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::StorageContext;
use crate::error::{CheckpointError, StorageError, StorageResult};
use crate::table::TableSnapshot;

const DEFAULT_CHECKPOINT_PREFIX: &str = "checkpoint";
const DEFAULT_CHECKPOINT_DIR_NAME: &str = ".checkpoint";
const MAX_CHECKPOINTS: usize = 5;
const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Runs once all transactions have drained. Commits and rollbacks are blocked while it runs.
pub trait Checkpointer {
    fn run(&mut self) -> StorageResult<()>;
}

/// Builds the checkpointer for each checkpoint request.
pub type CheckpointerFactory =
    Box<dyn Fn(&Arc<StorageContext>) -> Box<dyn Checkpointer> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    pub checkpoint_dir: PathBuf,
    pub checkpoint_prefix: String,
    /// Number of checkpoint files to keep, `0` keeps all of them.
    pub max_checkpoints: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: std::env::temp_dir().join(DEFAULT_CHECKPOINT_DIR_NAME),
            checkpoint_prefix: DEFAULT_CHECKPOINT_PREFIX.to_string(),
            max_checkpoints: MAX_CHECKPOINTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    /// LSN of the checkpoint record; the log holds nothing older once the checkpoint completes.
    pub lsn: u64,
    pub version: u32,
}

/// Every durable table of a database at a quiescent point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub metadata: SnapshotMetadata,
    pub tables: Vec<TableSnapshot>,
}

impl DatabaseSnapshot {
    pub fn new(tables: Vec<TableSnapshot>, lsn: u64) -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        Self {
            metadata: SnapshotMetadata {
                created_at,
                lsn,
                version: CHECKPOINT_FORMAT_VERSION,
            },
            tables,
        }
    }

    /// Writes the snapshot as `len | crc32 | payload`.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> StorageResult<()> {
        let mut writer = BufWriter::new(File::create(path).map_err(CheckpointError::Io)?);

        let serialized = postcard::to_allocvec(self)
            .map_err(|e| CheckpointError::SerializationFailed(e.to_string()))?;
        let len = u32::try_from(serialized.len()).map_err(|_| {
            CheckpointError::SerializationFailed(format!(
                "snapshot of {} bytes does not fit a frame",
                serialized.len()
            ))
        })?;
        let mut hasher = Hasher::new();
        hasher.update(&serialized);
        let checksum = hasher.finalize();

        writer
            .write_all(&len.to_le_bytes())
            .map_err(CheckpointError::Io)?;
        writer
            .write_all(&checksum.to_le_bytes())
            .map_err(CheckpointError::Io)?;
        writer.write_all(&serialized).map_err(CheckpointError::Io)?;
        writer.flush().map_err(CheckpointError::Io)?;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let mut reader = BufReader::new(File::open(path).map_err(CheckpointError::Io)?);

        let mut len_bytes = [0u8; 4];
        reader
            .read_exact(&mut len_bytes)
            .map_err(CheckpointError::Io)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut checksum_bytes = [0u8; 4];
        reader
            .read_exact(&mut checksum_bytes)
            .map_err(CheckpointError::Io)?;
        let checksum = u32::from_le_bytes(checksum_bytes);

        let mut serialized = vec![0u8; len];
        reader
            .read_exact(&mut serialized)
            .map_err(CheckpointError::Io)?;

        let mut hasher = Hasher::new();
        hasher.update(&serialized);
        if hasher.finalize() != checksum {
            return Err(CheckpointError::ChecksumMismatch.into());
        }

        let snapshot: Self = postcard::from_bytes(&serialized)
            .map_err(|e| CheckpointError::DeserializationFailed(e.to_string()))?;
        if snapshot.metadata.version != CHECKPOINT_FORMAT_VERSION {
            return Err(CheckpointError::InvalidFormat(format!(
                "unsupported checkpoint version {}",
                snapshot.metadata.version
            ))
            .into());
        }
        Ok(snapshot)
    }

    /// Replaces the durable tables of `context` with the ones in this snapshot.
    pub fn restore(self, context: &StorageContext) -> StorageResult<()> {
        context.storage_manager().restore(self.tables)
    }
}

/// Checkpointer writing a [`DatabaseSnapshot`] file and truncating the log behind it.
pub struct SnapshotCheckpointer {
    context: Arc<StorageContext>,
    config: CheckpointConfig,
}

impl SnapshotCheckpointer {
    pub fn new(context: Arc<StorageContext>, config: CheckpointConfig) -> Self {
        Self { context, config }
    }

    pub fn factory(config: CheckpointConfig) -> CheckpointerFactory {
        Box::new(
            move |context: &Arc<StorageContext>| -> Box<dyn Checkpointer> {
                Box::new(SnapshotCheckpointer::new(context.clone(), config.clone()))
            },
        )
    }

    fn apply_retention_policy(&self) -> StorageResult<()> {
        if self.config.max_checkpoints == 0 {
            return Ok(());
        }
        let checkpoints = list_checkpoints(&self.config)?;
        let to_delete = checkpoints.len().saturating_sub(self.config.max_checkpoints);
        for (path, _) in checkpoints.into_iter().take(to_delete) {
            fs::remove_file(&path).map_err(CheckpointError::Io)?;
        }
        Ok(())
    }
}

impl Checkpointer for SnapshotCheckpointer {
    fn run(&mut self) -> StorageResult<()> {
        fs::create_dir_all(&self.config.checkpoint_dir).map_err(CheckpointError::Io)?;

        let tables = self.context.storage_manager().snapshot();
        let wal = self.context.wal_manager();
        let lsn = wal.log_checkpoint()?;
        wal.flush()?;

        let snapshot = DatabaseSnapshot::new(tables, lsn);
        let path = self.config.checkpoint_dir.join(format!(
            "{}_{}.bin",
            self.config.checkpoint_prefix,
            Uuid::new_v4()
        ));
        snapshot.save_to_file(&path)?;
        wal.truncate_until(lsn)?;
        if let Err(e) = self.apply_retention_policy() {
            warn!(error = %e, "failed to prune old checkpoints");
        }

        info!(
            lsn,
            num_tables = snapshot.tables.len(),
            path = %path.display(),
            "checkpoint written"
        );
        Ok(())
    }
}

/// Checkpoint files under the configured directory, oldest first.
///
/// Files that fail to load are skipped.
pub fn list_checkpoints(
    config: &CheckpointConfig,
) -> StorageResult<Vec<(PathBuf, SnapshotMetadata)>> {
    let entries = match fs::read_dir(&config.checkpoint_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::Checkpoint(CheckpointError::Io(e))),
    };

    let mut checkpoints = Vec::new();
    for entry in entries {
        let path = entry.map_err(CheckpointError::Io)?.path();
        let matches_prefix = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(&config.checkpoint_prefix));
        if !path.is_file() || !matches_prefix {
            continue;
        }
        match DatabaseSnapshot::load_from_file(&path) {
            Ok(snapshot) => checkpoints.push((path, snapshot.metadata)),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint"),
        }
    }
    checkpoints.sort_by_key(|(_, metadata)| metadata.lsn);
    Ok(checkpoints)
}

/// Restores the newest checkpoint into `context` and returns its metadata, or `None` when
/// there is no checkpoint.
pub fn load_latest(
    context: &StorageContext,
    config: &CheckpointConfig,
) -> StorageResult<Option<SnapshotMetadata>> {
    let Some((path, _)) = list_checkpoints(config)?.pop() else {
        return Ok(None);
    };
    let snapshot = DatabaseSnapshot::load_from_file(&path)?;
    let metadata = snapshot.metadata.clone();
    snapshot.restore(context)?;
    info!(lsn = metadata.lsn, path = %path.display(), "restored checkpoint");
    Ok(Some(metadata))
}
