#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use shale_core::{Column, Statement};
use shale_store::{Catalog, QueryResult, Session, StoreError};

/// A session over a throwaway catalog root with one database selected.
pub struct Fixture {
    /// Keeps the temp directory alive for the test's duration.
    pub dir: TempDir,
    pub session: Session,
}

pub const DB: &str = "shop";

/// Builds a session with database `shop` created and selected.
pub fn fixture() -> Fixture {
    let dir = TempDir::new().expect("temp dir");
    let mut session = Session::new(Catalog::new(dir.path()));
    session
        .execute(Statement::CreateDatabase {
            name: DB.to_string(),
        })
        .expect("create database");
    session
        .execute(Statement::UseDatabase {
            name: DB.to_string(),
        })
        .expect("use database");
    Fixture { dir, session }
}

pub fn exec(fixture: &mut Fixture, statement: Statement) -> QueryResult {
    fixture
        .session
        .execute(statement.clone())
        .unwrap_or_else(|e| panic!("statement failed: {statement:?}\nerror: {e}"))
}

pub fn exec_err(fixture: &mut Fixture, statement: Statement) -> StoreError {
    match fixture.session.execute(statement.clone()) {
        Ok(_) => panic!("expected error for: {statement:?}"),
        Err(e) => e,
    }
}

/// Executes a statement and unwraps its result set.
pub fn rows(fixture: &mut Fixture, statement: Statement) -> Vec<Vec<String>> {
    match exec(fixture, statement) {
        QueryResult::Rows { rows, .. } => rows,
        other => panic!("expected rows, got {other:?}"),
    }
}

pub fn values(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|s| s.to_string()).collect()
}

pub fn insert(fixture: &mut Fixture, table: &str, fields: &[&str]) {
    exec(
        fixture,
        Statement::Insert {
            table: table.to_string(),
            values: values(fields),
        },
    );
}

pub fn select_all(fixture: &mut Fixture, table: &str) -> Vec<Vec<String>> {
    rows(
        fixture,
        Statement::SelectAll {
            table: table.to_string(),
        },
    )
}

pub fn create_table(fixture: &mut Fixture, name: &str, columns: Vec<Column>) {
    exec(
        fixture,
        Statement::CreateTable {
            name: name.to_string(),
            columns,
        },
    );
}

pub fn data_file(fixture: &Fixture, table: &str) -> PathBuf {
    fixture.session.catalog().data_file(DB, table)
}

pub fn data_bytes(fixture: &Fixture, table: &str) -> Vec<u8> {
    fs::read(data_file(fixture, table)).expect("data file readable")
}

/// True when any `.db.temp` staging file is left in the database.
pub fn has_temp_files(fixture: &Fixture) -> bool {
    let dir = fixture.session.catalog().data_dir(DB);
    fs::read_dir(dir)
        .expect("data dir readable")
        .filter_map(|entry| entry.ok())
        .any(|entry| entry.file_name().to_string_lossy().ends_with(".db.temp"))
}
