mod common;

use std::any::Any;
use std::sync::Arc;

use common::create_test_wal_config;
use ferngraph_catalog::entry::TableCatalogEntry;
use ferngraph_catalog::memory::MemoryCatalog;
use ferngraph_catalog::property::PropertyDefinition;
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{InternalId, TableId, TableType};
use ferngraph_storage::common::wal::graph_wal::WalManager;
use ferngraph_storage::error::{StorageError, StorageResult};
use ferngraph_storage::local_storage::local_table::{LocalTable, LocalTableOps, TableInsertState};
use ferngraph_storage::table::{Table, TableSnapshot};
use ferngraph_storage::tp::SnapshotCheckpointer;
use ferngraph_storage::{StorageContext, StorageManager, Transaction, TransactionManager};
use ferngraph_transaction::{Timestamp, TransactionState, TransactionType};
use parking_lot::Mutex;

/// A durable table that only records when it is committed.
#[derive(Debug)]
struct RecordingTable {
    table_id: TableId,
    table_type: TableType,
    catalog_entry_id: TableId,
    fail: bool,
    log: Arc<Mutex<Vec<TableId>>>,
}

impl Table for RecordingTable {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn table_type(&self) -> TableType {
        self.table_type
    }

    fn catalog_entry_id(&self) -> TableId {
        self.catalog_entry_id
    }

    fn num_rows(&self) -> u64 {
        0
    }

    fn commit(
        &self,
        _txn: &Transaction,
        _entry: &TableCatalogEntry,
        local_table: &LocalTable,
    ) -> StorageResult<u64> {
        self.log.lock().push(self.table_id);
        if self.fail {
            return Err(StorageError::ConsistencyViolation(format!(
                "table {} refuses to commit",
                self.table_id
            )));
        }
        Ok(local_table.num_rows())
    }

    fn snapshot(&self) -> TableSnapshot {
        TableSnapshot::Node {
            table_id: self.table_id,
            rows: Vec::new(),
        }
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct Fixture {
    manager: Arc<TransactionManager>,
    tables: Vec<Arc<RecordingTable>>,
    log: Arc<Mutex<Vec<TableId>>>,
    wal_path: std::path::PathBuf,
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.wal_path);
    }
}

/// Node tables 0 and 1, rel group 2 holding rel table 3 from 0 to 1.
fn fixture(failing_table: Option<TableId>) -> Fixture {
    let catalog = MemoryCatalog::new();
    let a = catalog
        .create_node_table("a", vec![], Timestamp::SYSTEM)
        .unwrap();
    let b = catalog
        .create_node_table("b", vec![], Timestamp::SYSTEM)
        .unwrap();
    let (group, rels) = catalog
        .create_rel_group(
            "ab",
            &[(a, b)],
            vec![PropertyDefinition::new("w", LogicalType::Int64, true)],
            Timestamp::SYSTEM,
        )
        .unwrap();
    assert_eq!((a, b, group, rels[0]), (0, 1, 2, 3));

    let log = Arc::new(Mutex::new(Vec::new()));
    let storage_manager = Arc::new(StorageManager::new());
    let mut tables = Vec::new();
    for (table_id, table_type, catalog_entry_id) in [
        (a, TableType::Node, a),
        (b, TableType::Node, b),
        (rels[0], TableType::Rel, group),
    ] {
        let table = Arc::new(RecordingTable {
            table_id,
            table_type,
            catalog_entry_id,
            fail: failing_table == Some(table_id),
            log: log.clone(),
        });
        storage_manager.register_table(table.clone()).unwrap();
        tables.push(table);
    }

    let wal_config = create_test_wal_config();
    let wal_path = wal_config.wal_path.clone();
    let context = Arc::new(StorageContext::new(
        Arc::new(catalog),
        storage_manager,
        Arc::new(WalManager::new(wal_config).unwrap()),
    ));
    let manager = TransactionManager::new(
        context,
        Default::default(),
        SnapshotCheckpointer::factory(common::create_test_checkpoint_config()),
    )
    .unwrap();
    Fixture {
        manager,
        tables,
        log,
        wal_path,
    }
}

/// Stages one row in every table, rel table first and node tables in descending id order.
fn stage_all(fixture: &Fixture, txn: &Transaction) {
    let [a, b, rel] = [&fixture.tables[0], &fixture.tables[1], &fixture.tables[2]];
    let mut state = TableInsertState::rel(
        InternalId::new(0, a.table_id),
        InternalId::new(0, b.table_id),
        vec![7i64.into()],
    );
    txn.insert(&**rel, &mut state).unwrap();
    txn.insert(&**b, &mut TableInsertState::node(vec![]))
        .unwrap();
    txn.insert(&**a, &mut TableInsertState::node(vec![]))
        .unwrap();
}

#[test]
fn test_node_tables_commit_before_rel_tables() {
    let fixture = fixture(None);
    let mut txn = fixture
        .manager
        .begin_transaction(TransactionType::Write)
        .unwrap();
    stage_all(&fixture, &txn);
    txn.commit().unwrap();
    assert_eq!(*fixture.log.lock(), vec![0, 1, 3]);
}

#[test]
fn test_failing_node_table_stops_commit() {
    let fixture = fixture(Some(0));
    let mut txn = fixture
        .manager
        .begin_transaction(TransactionType::Write)
        .unwrap();
    stage_all(&fixture, &txn);

    let err = txn.commit().unwrap_err();
    assert!(matches!(err, StorageError::PartialCommit { table_id: 0, .. }));
    assert_eq!(*fixture.log.lock(), vec![0]);
    assert_eq!(txn.state(), TransactionState::Failed);
    assert!(txn.local_storage().is_empty());
}

#[test]
fn test_failing_rel_table_after_node_phase() {
    let fixture = fixture(Some(3));
    let mut txn = fixture
        .manager
        .begin_transaction(TransactionType::Write)
        .unwrap();
    stage_all(&fixture, &txn);

    let err = txn.commit().unwrap_err();
    assert!(matches!(err, StorageError::PartialCommit { table_id: 3, .. }));
    assert_eq!(*fixture.log.lock(), vec![0, 1, 3]);
    assert_eq!(txn.state(), TransactionState::Failed);

    // The manager accepts a new writer once the failed one is gone.
    fixture
        .manager
        .begin_transaction(TransactionType::Write)
        .unwrap();
}
