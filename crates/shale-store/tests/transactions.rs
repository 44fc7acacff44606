//! Transaction semantics end-to-end: atomic commit, rollback,
//! savepoints, and prefix commits.

mod common;

use common::*;
use shale_core::{Column, Statement};
use shale_store::{QueryResult, StoreError};

fn orders_columns() -> Vec<Column> {
    vec![
        Column::int("id").primary_key().indexed(),
        Column::text("item", 32),
    ]
}

fn setup(fx: &mut Fixture) {
    create_table(fx, "orders", orders_columns());
}

fn begin(fx: &mut Fixture) {
    exec(fx, Statement::Begin);
}

fn commit(fx: &mut Fixture) {
    exec(fx, Statement::Commit);
}

fn txn_insert(fx: &mut Fixture, id: &str, item: &str) {
    exec(
        fx,
        Statement::Insert {
            table: "orders".to_string(),
            values: values(&[id, item]),
        },
    );
}

#[test]
fn commit_applies_all_logged_operations() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    txn_insert(&mut fx, "2", "mouse");
    commit(&mut fx);

    assert_eq!(
        select_all(&mut fx, "orders"),
        vec![values(&["1", "keyboard"]), values(&["2", "mouse"])]
    );
    assert!(!fx.session.in_transaction());
    assert!(!has_temp_files(&fx));
}

#[test]
fn logged_operations_touch_no_file_before_commit() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    // Reads bypass the log: the pre-transaction state is visible.
    assert!(select_all(&mut fx, "orders").is_empty());
    assert!(data_bytes(&fx, "orders").is_empty());
    commit(&mut fx);
    assert_eq!(select_all(&mut fx, "orders").len(), 1);
}

#[test]
fn failed_commit_leaves_files_unchanged_and_no_temps() {
    let mut fx = fixture();
    setup(&mut fx);
    insert(&mut fx, "orders", &["1", "keyboard"]);
    let before = data_bytes(&fx, "orders");

    begin(&mut fx);
    txn_insert(&mut fx, "2", "mouse");
    // Duplicate primary key: validation fails during apply.
    txn_insert(&mut fx, "1", "trackball");
    let err = fx.session.execute(Statement::Commit).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    // Zero logged operations are observable, the transaction is gone,
    // and no staging files remain.
    assert_eq!(data_bytes(&fx, "orders"), before);
    assert!(!fx.session.in_transaction());
    assert!(!has_temp_files(&fx));
}

#[test]
fn later_entries_see_earlier_entries_effects() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    exec(
        &mut fx,
        Statement::Update {
            table: "orders".to_string(),
            column: "item".to_string(),
            value: "mechanical keyboard".to_string(),
            predicate: "id = 1".to_string(),
        },
    );
    commit(&mut fx);

    assert_eq!(
        select_all(&mut fx, "orders"),
        vec![values(&["1", "mechanical keyboard"])]
    );
}

#[test]
fn duplicate_key_within_one_transaction_is_caught() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    txn_insert(&mut fx, "1", "mouse");
    let err = fx.session.execute(Statement::Commit).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));
    assert!(select_all(&mut fx, "orders").is_empty());
}

#[test]
fn rollback_discards_the_log() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    exec(&mut fx, Statement::Rollback);

    assert!(select_all(&mut fx, "orders").is_empty());
    assert!(!fx.session.in_transaction());
}

#[test]
fn transaction_state_errors() {
    let mut fx = fixture();
    setup(&mut fx);

    assert!(matches!(
        exec_err(&mut fx, Statement::Commit),
        StoreError::NoTransaction
    ));
    assert!(matches!(
        exec_err(&mut fx, Statement::Rollback),
        StoreError::NoTransaction
    ));

    begin(&mut fx);
    assert!(matches!(
        exec_err(&mut fx, Statement::Begin),
        StoreError::TransactionActive
    ));
    exec(&mut fx, Statement::Rollback);
}

#[test]
fn ddl_is_rejected_inside_a_transaction() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CreateTable {
                name: "other".to_string(),
                columns: vec![Column::int("id")],
            }
        ),
        StoreError::DdlInTransaction
    ));
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CreateIndex {
                table: "orders".to_string(),
                column: "item".to_string(),
            }
        ),
        StoreError::DdlInTransaction
    ));
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CreateDatabase {
                name: "other".to_string(),
            }
        ),
        StoreError::DdlInTransaction
    ));
}

#[test]
fn database_switch_is_rejected_inside_a_transaction() {
    let mut fx = fixture();
    setup(&mut fx);
    exec(
        &mut fx,
        Statement::CreateDatabase {
            name: "other".to_string(),
        },
    );

    begin(&mut fx);
    // Re-selecting the bound database is a no-op, not a switch.
    exec(
        &mut fx,
        Statement::UseDatabase {
            name: DB.to_string(),
        },
    );
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::UseDatabase {
                name: "other".to_string(),
            }
        ),
        StoreError::DatabaseSwitchInTransaction
    ));
}

#[test]
fn use_as_first_transaction_statement_binds_the_database() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut session = shale_store::Session::new(shale_store::Catalog::new(dir.path()));
    session
        .execute(Statement::CreateDatabase {
            name: DB.to_string(),
        })
        .unwrap();
    session
        .execute(Statement::UseDatabase {
            name: DB.to_string(),
        })
        .unwrap();
    session
        .execute(Statement::CreateTable {
            name: "orders".to_string(),
            columns: orders_columns(),
        })
        .unwrap();

    // A fresh session begins with no database; USE inside the
    // transaction binds it.
    let mut session = shale_store::Session::new(shale_store::Catalog::new(dir.path()));
    session.execute(Statement::Begin).unwrap();
    session
        .execute(Statement::UseDatabase {
            name: DB.to_string(),
        })
        .unwrap();
    session
        .execute(Statement::Insert {
            table: "orders".to_string(),
            values: values(&["1", "keyboard"]),
        })
        .unwrap();
    session.execute(Statement::Commit).unwrap();

    let QueryResult::Rows { rows, .. } = session
        .execute(Statement::SelectAll {
            table: "orders".to_string(),
        })
        .unwrap()
    else {
        panic!("expected rows");
    };
    assert_eq!(rows, vec![values(&["1", "keyboard"])]);
}

#[test]
fn checkpoint_commit_applies_only_the_prefix() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "cp1".to_string(),
        },
    );
    txn_insert(&mut fx, "2", "mouse");
    exec(
        &mut fx,
        Statement::CheckpointCommit {
            id: "cp1".to_string(),
        },
    );

    // Only the prefix before cp1 is committed; the insert of id 2
    // stays pending in the log.
    assert_eq!(select_all(&mut fx, "orders"), vec![values(&["1", "keyboard"])]);
    assert!(fx.session.in_transaction());

    commit(&mut fx);
    assert_eq!(
        select_all(&mut fx, "orders"),
        vec![values(&["1", "keyboard"]), values(&["2", "mouse"])]
    );
}

#[test]
fn checkpoint_rollback_truncates_the_pending_log() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "cp1".to_string(),
        },
    );
    txn_insert(&mut fx, "2", "mouse");
    txn_insert(&mut fx, "3", "monitor");
    exec(
        &mut fx,
        Statement::CheckpointRollback {
            id: "cp1".to_string(),
        },
    );
    commit(&mut fx);

    // Everything logged after cp1 was discarded.
    assert_eq!(select_all(&mut fx, "orders"), vec![values(&["1", "keyboard"])]);
}

#[test]
fn checkpoint_list_reports_savepoints() {
    let mut fx = fixture();
    setup(&mut fx);

    assert!(matches!(
        exec_err(&mut fx, Statement::CheckpointList),
        StoreError::NoTransaction
    ));

    begin(&mut fx);
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "alpha".to_string(),
        },
    );
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "beta".to_string(),
        },
    );
    let result = exec(&mut fx, Statement::CheckpointList);
    assert_eq!(
        result,
        QueryResult::Checkpoints(vec!["alpha".to_string(), "beta".to_string()])
    );
}

#[test]
fn checkpoint_id_errors() {
    let mut fx = fixture();
    setup(&mut fx);
    begin(&mut fx);

    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CheckpointCreate { id: String::new() }
        ),
        StoreError::EmptyCheckpointId
    ));
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "cp1".to_string(),
        },
    );
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CheckpointCreate {
                id: "cp1".to_string(),
            }
        ),
        StoreError::DuplicateCheckpoint(_)
    ));
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CheckpointRollback {
                id: "missing".to_string(),
            }
        ),
        StoreError::UnknownCheckpoint(_)
    ));
    assert!(matches!(
        exec_err(
            &mut fx,
            Statement::CheckpointCommit {
                id: "missing".to_string(),
            }
        ),
        StoreError::UnknownCheckpoint(_)
    ));
}

#[test]
fn failed_checkpoint_commit_keeps_the_transaction_alive() {
    let mut fx = fixture();
    setup(&mut fx);
    insert(&mut fx, "orders", &["1", "keyboard"]);

    begin(&mut fx);
    // Will collide with the committed row during apply.
    txn_insert(&mut fx, "1", "duplicate");
    exec(
        &mut fx,
        Statement::CheckpointCreate {
            id: "cp1".to_string(),
        },
    );
    let err = fx
        .session
        .execute(Statement::CheckpointCommit {
            id: "cp1".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    // The transaction and its log survive a failed prefix commit.
    assert!(fx.session.in_transaction());
    assert!(!has_temp_files(&fx));
    exec(&mut fx, Statement::Rollback);
    assert_eq!(select_all(&mut fx, "orders"), vec![values(&["1", "keyboard"])]);
}

#[test]
fn index_agrees_with_data_after_commit() {
    let mut fx = fixture();
    setup(&mut fx);

    begin(&mut fx);
    txn_insert(&mut fx, "1", "keyboard");
    txn_insert(&mut fx, "2", "mouse");
    commit(&mut fx);

    // The rebuilt index answers point lookups against the new file.
    let result = rows(
        &mut fx,
        Statement::SelectWhere {
            table: "orders".to_string(),
            predicate: "id = 2".to_string(),
        },
    );
    assert_eq!(result, vec![values(&["2", "mouse"])]);
}

#[test]
fn multi_table_commit_stages_every_affected_table() {
    let mut fx = fixture();
    setup(&mut fx);
    create_table(
        &mut fx,
        "shipments",
        vec![Column::int("id").primary_key()],
    );
    insert(&mut fx, "orders", &["1", "keyboard"]);

    begin(&mut fx);
    txn_insert(&mut fx, "2", "mouse");
    exec(
        &mut fx,
        Statement::Insert {
            table: "shipments".to_string(),
            values: values(&["100"]),
        },
    );
    exec(
        &mut fx,
        Statement::Delete {
            table: "orders".to_string(),
            predicate: "id = 1".to_string(),
        },
    );
    commit(&mut fx);

    assert_eq!(select_all(&mut fx, "orders"), vec![values(&["2", "mouse"])]);
    assert_eq!(select_all(&mut fx, "shipments"), vec![values(&["100"])]);
    assert!(!has_temp_files(&fx));
}
