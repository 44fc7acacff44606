//! Statement dispatch.
//!
//! A [`Session`] is the engine's entry point: it owns the catalog
//! handle, the active database name, and the single transaction, and
//! routes each [`Statement`] to the table layer or the transaction
//! log. There is no global state; embedders create one session per
//! logical connection and must serialize access themselves.
//!
//! Routing rules: reads always go to the table layer and observe the
//! last committed state, even inside a transaction. Writes go to the
//! transaction log when one is active, directly to the table layer
//! otherwise. DDL and database switches are rejected inside a
//! transaction.

use tracing::debug;

use shale_core::expr;
use shale_core::schema;
use shale_core::Statement;

use crate::catalog::Catalog;
use crate::error::{Result, StoreError};
use crate::table::Table;
use crate::txn::Transaction;

/// The outcome of one executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    /// The statement produced no rows.
    Unit,
    /// A result set with column headers.
    Rows {
        /// Header per output column (`table.column` for joins).
        columns: Vec<String>,
        /// The matching rows.
        rows: Vec<Vec<String>>,
    },
    /// The savepoints of the active transaction.
    Checkpoints(Vec<String>),
}

/// One logical connection to the engine.
#[derive(Debug)]
pub struct Session {
    catalog: Catalog,
    current_db: Option<String>,
    txn: Transaction,
}

impl Session {
    /// Creates a session with no active database.
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            current_db: None,
            txn: Transaction::new(),
        }
    }

    /// The catalog this session resolves names through.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The active database, if one has been selected.
    #[must_use]
    pub fn current_database(&self) -> Option<&str> {
        self.current_db.as_deref()
    }

    /// True while a transaction is active.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.txn.is_active()
    }

    /// Executes one statement.
    pub fn execute(&mut self, statement: Statement) -> Result<QueryResult> {
        debug!(?statement, "executing statement");
        match statement {
            Statement::CreateDatabase { name } => {
                self.ddl_guard()?;
                self.catalog.ensure_database(&name)?;
                Ok(QueryResult::Unit)
            }
            Statement::UseDatabase { name } => {
                if !self.catalog.database_exists(&name) {
                    return Err(StoreError::DatabaseNotFound(name));
                }
                if self.txn.is_active() {
                    self.txn.bind_database(&name)?;
                }
                self.current_db = Some(name);
                Ok(QueryResult::Unit)
            }
            Statement::CreateTable { name, columns } => {
                self.ddl_guard()?;
                let db = self.current_db()?.to_string();
                Table::create(&name, columns, &db, &self.catalog)?;
                Ok(QueryResult::Unit)
            }
            Statement::CreateIndex { table, column } => {
                self.ddl_guard()?;
                let db = self.current_db()?.to_string();
                Table::load(&table, &db, &self.catalog)?.create_index(&column)?;
                Ok(QueryResult::Unit)
            }
            Statement::Insert { table, values } => {
                let db = self.current_db()?.to_string();
                if self.txn.is_active() {
                    self.txn.add_insert(&table, values)?;
                } else {
                    Table::load(&table, &db, &self.catalog)?.insert(&values)?;
                }
                Ok(QueryResult::Unit)
            }
            Statement::SelectAll { table } => {
                let db = self.current_db()?.to_string();
                let table = Table::load(&table, &db, &self.catalog)?;
                let rows = table.select_all()?;
                Ok(QueryResult::Rows {
                    columns: column_headers(&table),
                    rows,
                })
            }
            Statement::SelectWhere { table, predicate } => {
                let db = self.current_db()?.to_string();
                let table = Table::load(&table, &db, &self.catalog)?;
                // A bare `column <op> value` predicate can use the
                // column's index instead of a full expression scan.
                let rows = match expr::simple_comparison(&predicate) {
                    Some((column, op, value))
                        if schema::column_index(table.columns(), &column).is_some() =>
                    {
                        table.select_where(&column, op.as_str(), &value)?
                    }
                    _ => table.select_where_expr(&predicate)?,
                };
                Ok(QueryResult::Rows {
                    columns: column_headers(&table),
                    rows,
                })
            }
            Statement::SelectJoin {
                left,
                right,
                condition,
            } => {
                let db = self.current_db()?.to_string();
                let left = Table::load(&left, &db, &self.catalog)?;
                let right = Table::load(&right, &db, &self.catalog)?;
                let (columns, rows) = left.select_join(&right, &condition)?;
                Ok(QueryResult::Rows { columns, rows })
            }
            Statement::Update {
                table,
                column,
                value,
                predicate,
            } => {
                let db = self.current_db()?.to_string();
                if self.txn.is_active() {
                    self.txn.add_update(&table, &column, &value, &predicate)?;
                } else {
                    Table::load(&table, &db, &self.catalog)?.update(&column, &value, &predicate)?;
                }
                Ok(QueryResult::Unit)
            }
            Statement::Delete { table, predicate } => {
                let db = self.current_db()?.to_string();
                if self.txn.is_active() {
                    self.txn.add_delete(&table, &predicate)?;
                } else {
                    Table::load(&table, &db, &self.catalog)?.delete_where(&predicate)?;
                }
                Ok(QueryResult::Unit)
            }
            Statement::Begin => {
                self.txn.begin(self.current_db.clone())?;
                Ok(QueryResult::Unit)
            }
            Statement::Commit => {
                self.txn.commit(&self.catalog)?;
                Ok(QueryResult::Unit)
            }
            Statement::Rollback => {
                self.txn.rollback()?;
                Ok(QueryResult::Unit)
            }
            Statement::CheckpointCreate { id } => {
                self.txn.create_checkpoint(&id)?;
                Ok(QueryResult::Unit)
            }
            Statement::CheckpointRollback { id } => {
                self.txn.rollback_to_checkpoint(&id)?;
                Ok(QueryResult::Unit)
            }
            Statement::CheckpointCommit { id } => {
                self.txn.commit_to_checkpoint(&id, &self.catalog)?;
                Ok(QueryResult::Unit)
            }
            Statement::CheckpointList => {
                if !self.txn.is_active() {
                    return Err(StoreError::NoTransaction);
                }
                Ok(QueryResult::Checkpoints(self.txn.list_checkpoints()))
            }
        }
    }

    fn current_db(&self) -> Result<&str> {
        self.current_db
            .as_deref()
            .ok_or(StoreError::NoDatabaseSelected)
    }

    fn ddl_guard(&self) -> Result<()> {
        if self.txn.is_active() {
            return Err(StoreError::DdlInTransaction);
        }
        Ok(())
    }
}

fn column_headers(table: &Table) -> Vec<String> {
    table.columns().iter().map(|c| c.name.clone()).collect()
}
