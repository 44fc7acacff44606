//! Parsed-statement surface.
//!
//! The engine does not parse SQL text; an upstream front-end delivers
//! one of these structured statements together with a session whose
//! active database names the target. Predicates and join conditions
//! stay as raw text and are handled by the expression engine.

use crate::schema::Column;

/// A statement the storage engine can execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Create a database directory.
    CreateDatabase {
        /// Database name.
        name: String,
    },

    /// Make a database the session's active database.
    UseDatabase {
        /// Database name.
        name: String,
    },

    /// Create a table in the active database.
    CreateTable {
        /// Table name.
        name: String,
        /// Ordered column definitions.
        columns: Vec<Column>,
    },

    /// Build a persistent index over one column.
    CreateIndex {
        /// Table name.
        table: String,
        /// Column to index.
        column: String,
    },

    /// Insert one row.
    Insert {
        /// Table name.
        table: String,
        /// One value per column, in schema order.
        values: Vec<String>,
    },

    /// Read every row.
    SelectAll {
        /// Table name.
        table: String,
    },

    /// Read the rows matching a predicate.
    SelectWhere {
        /// Table name.
        table: String,
        /// Predicate text; empty matches every row.
        predicate: String,
    },

    /// Equi-join two tables.
    SelectJoin {
        /// Left table name.
        left: String,
        /// Right table name.
        right: String,
        /// Condition of the form `left.col = right.col`.
        condition: String,
    },

    /// Set one column on every row matching a predicate.
    Update {
        /// Table name.
        table: String,
        /// Column to update.
        column: String,
        /// New value.
        value: String,
        /// Predicate text; must not be empty.
        predicate: String,
    },

    /// Delete every row matching a predicate.
    Delete {
        /// Table name.
        table: String,
        /// Predicate text; must not be empty.
        predicate: String,
    },

    /// Start a transaction.
    Begin,

    /// Apply the whole transaction log and end the transaction.
    Commit,

    /// Discard the transaction log and end the transaction.
    Rollback,

    /// Record a named savepoint at the current log position.
    CheckpointCreate {
        /// Savepoint identifier.
        id: String,
    },

    /// Truncate the log back to a savepoint.
    CheckpointRollback {
        /// Savepoint identifier.
        id: String,
    },

    /// Commit only the log prefix up to a savepoint.
    CheckpointCommit {
        /// Savepoint identifier.
        id: String,
    },

    /// List the savepoints of the active transaction.
    CheckpointList,
}
