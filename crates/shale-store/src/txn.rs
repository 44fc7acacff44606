//! Transactions: log-buffered mutations with all-or-nothing commit.
//!
//! A transaction never touches a committed file before commit. Logged
//! operations are applied in log order during commit, in three phases:
//!
//! 1. **stage** — every distinct table named in the log is copied
//!    verbatim to `<table>.db.temp`;
//! 2. **apply** — each log entry runs against its table's temp file,
//!    so later entries see the effects of earlier ones;
//! 3. **swap** — each temp file replaces the live file by remove +
//!    rename, with a best-effort `.bak` copy for restore if the rename
//!    fails.
//!
//! Any staging or apply failure deletes the temp files and forces a
//! rollback; committed files are only touched in the swap phase.
//! Named savepoints (checkpoints) mark log positions: the log can be
//! truncated back to one, or the prefix up to one can be committed on
//! its own while the rest of the log stays pending.

use std::collections::BTreeMap;
use std::fs;

use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::{Result, StoreError};
use crate::table::{IndexMaintenance, Table};

/// A logged mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Insert one row.
    Insert {
        /// One value per column, in schema order.
        values: Vec<String>,
    },
    /// Set one column on every row matching the predicate.
    Update {
        /// Column to update.
        column: String,
        /// New value.
        value: String,
        /// Predicate text.
        predicate: String,
    },
    /// Delete every row matching the predicate.
    Delete {
        /// Predicate text.
        predicate: String,
    },
}

/// One entry of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Target table.
    pub table: String,
    /// The logged mutation.
    pub op: Operation,
    /// The savepoint that was current when the entry was logged.
    pub checkpoint: Option<String>,
}

/// The session's single transaction.
#[derive(Debug, Default)]
pub struct Transaction {
    active: bool,
    db: Option<String>,
    log: Vec<LogEntry>,
    checkpoints: BTreeMap<String, usize>,
    current: Option<String>,
}

impl Transaction {
    /// Creates an inactive transaction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a transaction is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The database this transaction is bound to, once known.
    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.db.as_deref()
    }

    /// The logged entries, in order.
    #[must_use]
    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    /// Starts a transaction bound to the given database (possibly not
    /// yet known). Fails if one is already active.
    pub fn begin(&mut self, db: Option<String>) -> Result<()> {
        if self.active {
            return Err(StoreError::TransactionActive);
        }
        self.log.clear();
        self.checkpoints.clear();
        self.current = None;
        self.db = db;
        self.active = true;
        info!("transaction started");
        Ok(())
    }

    /// Binds the transaction to a database.
    ///
    /// Allowed while nothing has been logged and no database is bound,
    /// or when the name matches the bound database; anything else is a
    /// mid-transaction switch and fails.
    pub fn bind_database(&mut self, name: &str) -> Result<()> {
        match &self.db {
            Some(db) if db == name => Ok(()),
            None if self.log.is_empty() => {
                self.db = Some(name.to_string());
                Ok(())
            }
            _ => Err(StoreError::DatabaseSwitchInTransaction),
        }
    }

    /// Logs an INSERT; no file is touched.
    pub fn add_insert(&mut self, table: &str, values: Vec<String>) -> Result<()> {
        self.push_entry(table, Operation::Insert { values })
    }

    /// Logs an UPDATE; no file is touched.
    pub fn add_update(
        &mut self,
        table: &str,
        column: &str,
        value: &str,
        predicate: &str,
    ) -> Result<()> {
        self.push_entry(
            table,
            Operation::Update {
                column: column.to_string(),
                value: value.to_string(),
                predicate: predicate.to_string(),
            },
        )
    }

    /// Logs a DELETE; no file is touched.
    pub fn add_delete(&mut self, table: &str, predicate: &str) -> Result<()> {
        self.push_entry(
            table,
            Operation::Delete {
                predicate: predicate.to_string(),
            },
        )
    }

    fn push_entry(&mut self, table: &str, op: Operation) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }
        debug!(table, checkpoint = ?self.current, "logged operation");
        self.log.push(LogEntry {
            table: table.to_string(),
            op,
            checkpoint: self.current.clone(),
        });
        Ok(())
    }

    /// Applies the whole log and ends the transaction.
    ///
    /// On any failure the temp files are removed, the transaction is
    /// rolled back, and the error is returned; committed files are
    /// unchanged unless the failure happened in the swap phase.
    pub fn commit(&mut self, catalog: &Catalog) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }

        let result = if self.log.is_empty() {
            Ok(())
        } else {
            match &self.db {
                Some(db) => Self::commit_entries(catalog, db, &self.log),
                None => Err(StoreError::NoDatabaseSelected),
            }
        };

        self.reset();
        match &result {
            Ok(()) => info!("transaction committed"),
            Err(e) => warn!(error = %e, "transaction failed, rolled back"),
        }
        result
    }

    /// Discards the log and ends the transaction. No file I/O.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }
        self.reset();
        info!("transaction rolled back");
        Ok(())
    }

    /// Records a savepoint at the current log position and makes it
    /// current.
    pub fn create_checkpoint(&mut self, id: &str) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }
        if id.is_empty() {
            return Err(StoreError::EmptyCheckpointId);
        }
        if self.checkpoints.contains_key(id) {
            return Err(StoreError::DuplicateCheckpoint(id.to_string()));
        }
        self.checkpoints.insert(id.to_string(), self.log.len());
        self.current = Some(id.to_string());
        debug!(checkpoint = id, position = self.log.len(), "created checkpoint");
        Ok(())
    }

    /// Truncates the log back to a savepoint, dropping every savepoint
    /// recorded after it, and makes it current.
    pub fn rollback_to_checkpoint(&mut self, id: &str) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }
        let position = *self
            .checkpoints
            .get(id)
            .ok_or_else(|| StoreError::UnknownCheckpoint(id.to_string()))?;
        self.log.truncate(position);
        self.checkpoints.retain(|_, &mut p| p <= position);
        self.current = Some(id.to_string());
        debug!(checkpoint = id, position, "rolled back to checkpoint");
        Ok(())
    }

    /// Commits only the log prefix recorded before the savepoint; the
    /// rest of the log stays pending with savepoint positions shifted
    /// down accordingly.
    ///
    /// A failure cleans up the temp files and leaves the whole
    /// transaction (log included) intact.
    pub fn commit_to_checkpoint(&mut self, id: &str, catalog: &Catalog) -> Result<()> {
        if !self.active {
            return Err(StoreError::NoTransaction);
        }
        let position = *self
            .checkpoints
            .get(id)
            .ok_or_else(|| StoreError::UnknownCheckpoint(id.to_string()))?;

        if position > 0 {
            let db = self.db.clone().ok_or(StoreError::NoDatabaseSelected)?;
            Self::commit_entries(catalog, &db, &self.log[..position])?;
            self.log.drain(..position);
            for p in self.checkpoints.values_mut() {
                *p = p.saturating_sub(position);
            }
        }
        info!(checkpoint = id, remaining = self.log.len(), "committed to checkpoint");
        Ok(())
    }

    /// The savepoint identifiers of the active transaction, sorted.
    #[must_use]
    pub fn list_checkpoints(&self) -> Vec<String> {
        self.checkpoints.keys().cloned().collect()
    }

    /// True when the savepoint exists.
    #[must_use]
    pub fn has_checkpoint(&self, id: &str) -> bool {
        self.checkpoints.contains_key(id)
    }

    fn reset(&mut self) {
        self.log.clear();
        self.checkpoints.clear();
        self.current = None;
        self.db = None;
        self.active = false;
    }

    /// Stage, apply, and swap one batch of log entries.
    fn commit_entries(catalog: &Catalog, db: &str, entries: &[LogEntry]) -> Result<()> {
        let mut affected: Vec<String> = Vec::new();
        for entry in entries {
            if !affected.contains(&entry.table) {
                affected.push(entry.table.clone());
            }
        }

        // Stage: copy each table's live file to its temp twin.
        let mut staged: Vec<String> = Vec::new();
        for table in &affected {
            let source = catalog.data_file(db, table);
            let temp = catalog.temp_file(db, table);
            if let Err(e) = fs::copy(&source, &temp) {
                warn!(table = %table, error = %e, "failed to stage table");
                Self::remove_temps(catalog, db, &staged);
                return Err(e.into());
            }
            staged.push(table.clone());
        }

        // Apply: run each entry against its temp file, in log order.
        for entry in entries {
            let temp = catalog.temp_file(db, &entry.table);
            let applied = Table::load(&entry.table, db, catalog).and_then(|mut table| {
                match &entry.op {
                    Operation::Insert { values } => {
                        table.insert_into(values, &temp, IndexMaintenance::Deferred)
                    }
                    Operation::Update {
                        column,
                        value,
                        predicate,
                    } => table
                        .update_at(column, value, predicate, &temp, IndexMaintenance::Deferred)
                        .map(|_| ()),
                    Operation::Delete { predicate } => table
                        .delete_where_at(predicate, &temp, IndexMaintenance::Deferred)
                        .map(|_| ()),
                }
            });
            if let Err(e) = applied {
                warn!(table = %entry.table, error = %e, "failed to apply logged operation");
                Self::remove_temps(catalog, db, &staged);
                return Err(e);
            }
            debug!(table = %entry.table, "applied logged operation");
        }

        // Swap: move each temp file into place behind a backup.
        for table in &affected {
            Self::swap_table(catalog, db, table).inspect_err(|_| {
                Self::remove_temps(catalog, db, &staged);
            })?;
        }

        // The live files changed underneath the indexes; rebuild them.
        for table in &affected {
            Table::load(table, db, catalog)?.rebuild_indexes()?;
        }

        Ok(())
    }

    /// Replaces `<table>.db` with its staged temp file.
    fn swap_table(catalog: &Catalog, db: &str, table: &str) -> Result<()> {
        let live = catalog.data_file(db, table);
        let temp = catalog.temp_file(db, table);
        let backup = catalog.backup_file(db, table);

        if let Err(e) = fs::copy(&live, &backup) {
            warn!(table, error = %e, "could not create backup before swap");
        }

        match fs::remove_file(&live) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(table, error = %e, "could not remove live file for swap");
                let _ = fs::remove_file(&backup);
                return Err(e.into());
            }
        }

        if let Err(e) = fs::rename(&temp, &live) {
            warn!(table, error = %e, "rename failed, restoring from backup");
            if fs::copy(&backup, &live).is_err() {
                warn!(table, "backup restore failed; table may be inconsistent");
            }
            let _ = fs::remove_file(&backup);
            return Err(StoreError::CommitSwap {
                table: table.to_string(),
            });
        }

        let _ = fs::remove_file(&backup);
        Ok(())
    }

    fn remove_temps(catalog: &Catalog, db: &str, staged: &[String]) {
        for table in staged {
            let _ = fs::remove_file(catalog.temp_file(db, table));
        }
    }
}
