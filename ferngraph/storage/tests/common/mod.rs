#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use ferngraph_catalog::memory::MemoryCatalog;
use ferngraph_catalog::property::PropertyDefinition;
use ferngraph_common::data_type::LogicalType;
use ferngraph_common::types::{InternalId, TableId};
use ferngraph_storage::common::wal::graph_wal::{WalManager, WalManagerConfig};
use ferngraph_storage::local_storage::local_table::TableInsertState;
use ferngraph_storage::table::node_table::NodeTable;
use ferngraph_storage::table::rel_table::RelTable;
use ferngraph_storage::tp::{CheckpointConfig, SnapshotCheckpointer};
use ferngraph_storage::{
    StorageContext, StorageManager, Transaction, TransactionManager, TransactionManagerConfig,
};
use ferngraph_transaction::Timestamp;

pub struct TestCleaner {
    wal_path: PathBuf,
    checkpoint_dir: PathBuf,
}

impl Drop for TestCleaner {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.wal_path);
        let _ = fs::remove_dir_all(&self.checkpoint_dir);
    }
}

/// A database with `person(name STRING, age INT64)` and `knows(since INT64)` from person to
/// person.
pub struct TestDb {
    pub catalog: Arc<MemoryCatalog>,
    pub context: Arc<StorageContext>,
    pub manager: Arc<TransactionManager>,
    pub checkpoint_config: CheckpointConfig,
    pub person: TableId,
    pub knows_group: TableId,
    pub knows: TableId,
    _cleaner: TestCleaner,
}

fn unique_name(prefix: &str) -> String {
    format!(
        "{prefix}_{}_{}",
        std::process::id(),
        rand::random::<u64>()
    )
}

pub fn create_test_wal_config() -> WalManagerConfig {
    WalManagerConfig {
        wal_path: std::env::temp_dir().join(format!("{}.log", unique_name("test_wal"))),
    }
}

pub fn create_test_checkpoint_config() -> CheckpointConfig {
    CheckpointConfig {
        checkpoint_dir: std::env::temp_dir().join(unique_name("test_checkpoint")),
        checkpoint_prefix: "test_checkpoint".to_string(),
        max_checkpoints: 3,
    }
}

pub fn create_test_catalog() -> (Arc<MemoryCatalog>, TableId, TableId, TableId) {
    let catalog = MemoryCatalog::new();
    let person = catalog
        .create_node_table(
            "person",
            vec![
                PropertyDefinition::new("name", LogicalType::String, false),
                PropertyDefinition::new("age", LogicalType::Int64, true),
            ],
            Timestamp::SYSTEM,
        )
        .unwrap();
    let (knows_group, rels) = catalog
        .create_rel_group(
            "knows",
            &[(person, person)],
            vec![PropertyDefinition::new("since", LogicalType::Int64, true)],
            Timestamp::SYSTEM,
        )
        .unwrap();
    (Arc::new(catalog), person, knows_group, rels[0])
}

pub fn create_test_db_with(config: TransactionManagerConfig) -> TestDb {
    let (catalog, person, knows_group, knows) = create_test_catalog();
    let wal_config = create_test_wal_config();
    let checkpoint_config = create_test_checkpoint_config();
    let cleaner = TestCleaner {
        wal_path: wal_config.wal_path.clone(),
        checkpoint_dir: checkpoint_config.checkpoint_dir.clone(),
    };

    let storage_manager = Arc::new(StorageManager::new());
    storage_manager
        .create_tables_from_catalog(catalog.as_ref(), Timestamp::SYSTEM)
        .unwrap();
    let wal_manager = Arc::new(WalManager::new(wal_config).unwrap());
    let context = Arc::new(StorageContext::new(
        catalog.clone(),
        storage_manager,
        wal_manager,
    ));
    let manager = TransactionManager::new(
        context.clone(),
        config,
        SnapshotCheckpointer::factory(checkpoint_config.clone()),
    )
    .unwrap();

    TestDb {
        catalog,
        context,
        manager,
        checkpoint_config,
        person,
        knows_group,
        knows,
        _cleaner: cleaner,
    }
}

pub fn create_test_db() -> TestDb {
    create_test_db_with(TransactionManagerConfig::default())
}

impl TestDb {
    pub fn person_table(&self) -> Arc<NodeTable> {
        self.context
            .storage_manager()
            .get_node_table(self.person)
            .unwrap()
    }

    pub fn knows_table(&self) -> Arc<RelTable> {
        self.context.storage_manager().get_rel_table(self.knows).unwrap()
    }

    pub fn insert_person(&self, txn: &Transaction, name: &str, age: i64) -> InternalId {
        let mut state = TableInsertState::node(vec![name.into(), age.into()]);
        txn.insert(&*self.person_table(), &mut state).unwrap();
        state.inserted_id().unwrap()
    }

    pub fn insert_knows(
        &self,
        txn: &Transaction,
        src: InternalId,
        dst: InternalId,
        since: i64,
    ) -> InternalId {
        let mut state = TableInsertState::rel(src, dst, vec![since.into()]);
        txn.insert(&*self.knows_table(), &mut state).unwrap();
        state.inserted_id().unwrap()
    }
}
