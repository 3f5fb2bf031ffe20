mod common;

use common::*;
use ferngraph_common::constants::LOCAL_REL_OFFSET_START;
use ferngraph_common::types::{InternalId, RelDataDirection};
use ferngraph_common::value::ScalarValue;
use ferngraph_storage::common::wal::graph_wal::Operation;
use ferngraph_storage::error::{AdmissionError, StorageError, TransactionError};
use ferngraph_storage::local_storage::local_table::{
    LocalTableOps, NodeTableDeleteState, NodeTableUpdateState, TableDeleteState,
    TableInsertState, TableUpdateState,
};
use ferngraph_storage::table::Table;
use ferngraph_storage::TransactionManagerConfig;
use ferngraph_transaction::{GraphTxnManager, Timestamp, TransactionState, TransactionType};

#[test]
fn test_commit_publishes_nodes_and_rels() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();

    let alice = db.insert_person(&txn, "alice", 30);
    let bob = db.insert_person(&txn, "bob", 25);
    assert_eq!(alice, InternalId::new(0, db.person));
    assert_eq!(bob, InternalId::new(1, db.person));
    let rel = db.insert_knows(&txn, alice, bob, 2020);
    assert_eq!(rel, InternalId::new(LOCAL_REL_OFFSET_START, db.knows));

    let local = txn.local_storage().get_local_table(db.knows).unwrap();
    let local_rel = local.as_rel().unwrap();
    assert!(local_rel.check_if_node_has_rels(&[alice], RelDataDirection::Fwd));
    assert!(local_rel.check_if_node_has_rels(&[bob], RelDataDirection::Bwd));
    assert!(!local_rel.check_if_node_has_rels(&[bob], RelDataDirection::Fwd));

    // Nothing is durable before commit.
    assert_eq!(db.person_table().num_rows(), 0);
    assert_eq!(db.knows_table().num_rows(), 0);

    txn.commit().unwrap();
    assert_eq!(txn.state(), TransactionState::Committed);
    assert!(!db.manager.has_active_write_transactions());

    let person = db.person_table();
    assert_eq!(person.num_rows(), 2);
    assert_eq!(
        person.lookup(1),
        Some(vec![ScalarValue::from("bob"), ScalarValue::from(25i64)])
    );

    let knows = db.knows_table();
    let fwd = knows.scan_bound_node(RelDataDirection::Fwd, alice.offset);
    assert_eq!(fwd.len(), 1);
    assert_eq!(fwd[0].nbr, bob);
    assert_eq!(fwd[0].rel_id, InternalId::new(0, db.knows));
    assert_eq!(fwd[0].properties, vec![ScalarValue::from(2020i64)]);
    assert_eq!(knows.scan_bound_node(RelDataDirection::Bwd, bob.offset).len(), 1);
}

#[test]
fn test_committed_rel_visible_to_later_reader() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let ids: Vec<_> = (0..8)
        .map(|i| db.insert_person(&txn, &format!("p{i}"), i))
        .collect();
    db.insert_knows(&txn, ids[3], ids[7], 2021);
    txn.commit().unwrap();

    let reader = db.manager.begin_transaction(TransactionType::ReadOnly).unwrap();
    assert!(reader.local_storage().is_empty());
    let knows = db.knows_table();
    let rows = knows.scan_bound_node(RelDataDirection::Fwd, 3);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].nbr, ids[7]);
    assert_eq!(rows[0].rel_id.offset, 0);
    assert!(knows.check_if_node_has_rels(&[ids[3]], RelDataDirection::Fwd));
    assert!(!knows.check_if_node_has_rels(&[ids[7]], RelDataDirection::Fwd));
    assert!(knows.check_if_node_has_rels(&[ids[7]], RelDataDirection::Bwd));
}

#[test]
fn test_commit_logs_node_tables_before_rel_tables() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let txn_id = txn.txn_id();
    // Touch the rel table first so that map order differs from commit order.
    let alice = InternalId::new(0, db.person);
    db.insert_knows(&txn, alice, alice, 1);
    db.insert_person(&txn, "alice", 30);
    txn.commit().unwrap();

    let ops: Vec<_> = db
        .context
        .wal_manager()
        .read_all()
        .unwrap()
        .into_iter()
        .filter(|e| e.txn_id == txn_id)
        .map(|e| e.op)
        .collect();
    assert!(matches!(ops[0], Operation::BeginTransaction(_)));
    assert!(matches!(
        ops[1],
        Operation::TableCommitted { table_id, num_rows: 1, .. } if table_id == db.person
    ));
    assert!(matches!(
        ops[2],
        Operation::TableCommitted { table_id, num_rows: 1, .. } if table_id == db.knows
    ));
    assert!(matches!(ops[3], Operation::CommitTransaction(_)));
    assert_eq!(ops.len(), 4);
}

#[test]
fn test_partial_commit_marks_transaction_failed() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let txn_id = txn.txn_id();
    let alice = db.insert_person(&txn, "alice", 30);
    db.insert_knows(&txn, alice, InternalId::new(42, db.person), 1);

    let err = txn.commit().unwrap_err();
    let StorageError::PartialCommit { table_id, .. } = &err else {
        panic!("expected a partial commit, got {err:?}");
    };
    assert_eq!(*table_id, db.knows);
    assert!(matches!(err.root_cause(), StorageError::ConsistencyViolation(_)));
    assert_eq!(txn.state(), TransactionState::Failed);
    assert!(!db.manager.has_active_write_transactions());

    // The node phase already ran; the rel table is untouched.
    assert_eq!(db.person_table().num_rows(), 1);
    assert_eq!(db.knows_table().num_rows(), 0);

    let ops: Vec<_> = db
        .context
        .wal_manager()
        .read_all()
        .unwrap()
        .into_iter()
        .filter(|e| e.txn_id == txn_id)
        .map(|e| e.op)
        .collect();
    assert!(matches!(ops.last(), Some(Operation::RollbackTransaction)));
    assert!(!ops.iter().any(|op| matches!(op, Operation::CommitTransaction(_))));

    // A failed transaction can be rolled back again without effect, but not committed.
    txn.rollback().unwrap();
    assert!(matches!(
        txn.commit(),
        Err(StorageError::Transaction(TransactionError::NotActive(_)))
    ));
}

#[test]
fn test_rollback_discards_staged_rows() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    db.insert_person(&txn, "alice", 30);
    let local = txn.local_storage().get_local_table(db.person).unwrap();
    assert!(!local.is_empty());

    txn.rollback().unwrap();
    assert_eq!(txn.state(), TransactionState::RolledBack);
    assert!(local.is_empty());
    assert_eq!(txn.local_storage().num_tables(), 1);
    txn.rollback().unwrap();
    assert_eq!(db.person_table().num_rows(), 0);
    assert!(!db.manager.has_active_write_transactions());
}

#[test]
fn test_dropping_active_transaction_rolls_back() {
    let db = create_test_db();
    {
        let txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
        db.insert_person(&txn, "alice", 30);
        assert!(db.manager.has_active_write_transactions());
    }
    assert!(!db.manager.has_active_write_transactions());
    assert_eq!(db.manager.num_active_transactions(), 0);
    assert_eq!(db.person_table().num_rows(), 0);
}

#[test]
fn test_local_update_and_delete_before_commit() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let person = db.person_table();
    let alice = db.insert_person(&txn, "alice", 30);
    let bob = db.insert_person(&txn, "bob", 25);

    let update = TableUpdateState::Node(NodeTableUpdateState {
        node_offset: alice.offset,
        column_id: 1,
        value: 31i64.into(),
    });
    assert!(txn.update(&*person, &update).unwrap());

    let delete = TableDeleteState::Node(NodeTableDeleteState {
        node_offset: bob.offset,
    });
    assert!(txn.delete(&*person, &delete).unwrap());
    txn.commit().unwrap();

    assert_eq!(person.num_rows(), 2);
    assert_eq!(person.num_live_rows(), 1);
    assert_eq!(person.lookup(alice.offset).unwrap()[1], ScalarValue::from(31i64));
    assert!(!person.contains_node(bob.offset));

    // The next transaction continues after the tombstone.
    let txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    assert_eq!(db.insert_person(&txn, "carol", 40), InternalId::new(2, db.person));
}

#[test]
fn test_read_only_transaction_rejects_writes() {
    let db = create_test_db();
    let mut txn = db.manager.begin_transaction(TransactionType::ReadOnly).unwrap();
    let mut state = TableInsertState::node(vec!["alice".into(), 30i64.into()]);
    assert!(matches!(
        txn.insert(&*db.person_table(), &mut state),
        Err(StorageError::Transaction(TransactionError::ReadOnly(_)))
    ));
    assert_eq!(txn.local_storage().num_tables(), 0);
    txn.commit().unwrap();
}

#[test]
fn test_interrupted_transaction_rejects_writes() {
    let db = create_test_db();
    let txn = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let handle = txn.interrupt_handle();
    assert!(!txn.is_interrupted());
    handle.interrupt();
    assert!(txn.is_interrupted());

    let mut state = TableInsertState::node(vec!["alice".into(), 30i64.into()]);
    assert!(matches!(
        txn.insert(&*db.person_table(), &mut state),
        Err(StorageError::Transaction(TransactionError::Interrupted(_)))
    ));
}

#[test]
fn test_single_writer_admission() {
    let db = create_test_db();
    let writer = db.manager.begin_transaction(TransactionType::Write).unwrap();
    assert!(matches!(
        db.manager.begin_transaction(TransactionType::Write),
        Err(StorageError::Admission(AdmissionError::WriteTransactionActive))
    ));
    let reader = db.manager.begin_transaction(TransactionType::ReadOnly).unwrap();
    assert_eq!(db.manager.num_active_transactions(), 2);
    drop(writer);
    drop(reader);
    db.manager.begin_transaction(TransactionType::Write).unwrap();
}

#[test]
fn test_multiple_writers_when_not_enforced() {
    let db = create_test_db_with(TransactionManagerConfig {
        enforce_single_writer: false,
        ..Default::default()
    });
    let _a = db.manager.begin_transaction(TransactionType::Write).unwrap();
    let _b = db.manager.begin_transaction(TransactionType::Write).unwrap();
    assert_eq!(db.manager.num_active_transactions(), 2);
}

#[test]
fn test_timestamps_and_ids() {
    let db = create_test_db();
    let mut reader = db.manager.begin_transaction(TransactionType::ReadOnly).unwrap();
    assert_eq!(reader.start_ts(), Timestamp::with_ts(1));
    assert!(reader.txn_id().is_txn_id());
    reader.commit().unwrap();

    let mut writer = db.manager.begin_transaction(TransactionType::Write).unwrap();
    assert_eq!(writer.start_ts(), Timestamp::with_ts(2));
    writer.commit().unwrap();

    let reader = db.manager.begin_transaction(TransactionType::ReadOnly).unwrap();
    assert_eq!(reader.start_ts(), Timestamp::with_ts(2));
    assert!(reader.txn_id() > writer.txn_id());
}

#[test]
fn test_commit_through_manager_trait() {
    fn run<M: GraphTxnManager>(manager: &M) -> Result<(), M::Error> {
        let mut txn = manager.begin_transaction(TransactionType::Write)?;
        manager.commit(&mut txn)
    }
    let db = create_test_db();
    run(&*db.manager).unwrap();
    assert!(!db.manager.has_active_write_transactions());
}
