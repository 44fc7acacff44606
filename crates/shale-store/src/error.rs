//! Error types for the storage layer.

use std::fmt;
use std::path::PathBuf;

use shale_core::{ExprError, RecordError, SchemaError};

/// Which uniqueness constraint a duplicate value violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// The table's primary key.
    Primary,
    /// A UNIQUE column.
    Unique,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary key"),
            Self::Unique => write!(f, "unique"),
        }
    }
}

/// Errors that can occur during storage operations.
///
/// Validation and referential errors abort the single operation and
/// leave every file unchanged. I/O errors during transaction staging
/// or apply force a rollback after temp-file cleanup. A failure while
/// swapping committed files into place ([`StoreError::CommitSwap`]) is
/// the one category that can leave a table inconsistent; a best-effort
/// backup restore is attempted first.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A schema file failed to parse or emit.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A predicate failed to compile or evaluate.
    #[error("predicate error: {0}")]
    Expr(#[from] ExprError),

    /// A row failed to encode.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// INSERT received the wrong number of values.
    #[error("table '{table}' expects {expected} values, got {got}")]
    Arity {
        /// Target table.
        table: String,
        /// Number of columns.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// An empty value for a NOT_NULL column.
    #[error("column '{column}' in table '{table}' cannot be null")]
    NullViolation {
        /// Target table.
        table: String,
        /// The NOT_NULL column.
        column: String,
    },

    /// A value for an INT column that is not an integer.
    #[error("invalid INT value '{value}' for column '{column}' in table '{table}'")]
    InvalidInt {
        /// Target table.
        table: String,
        /// The INT column.
        column: String,
        /// The rejected value.
        value: String,
    },

    /// A value longer than its column's field width.
    #[error("value '{value}' exceeds the {width}-byte width of column '{column}' in table '{table}'")]
    ValueTooWide {
        /// Target table.
        table: String,
        /// The column.
        column: String,
        /// The oversized value.
        value: String,
        /// The declared width.
        width: usize,
    },

    /// A duplicate value for a primary-key or UNIQUE column.
    #[error("{kind} value '{value}' already exists in column '{column}' of table '{table}'")]
    DuplicateKey {
        /// Primary key or unique.
        kind: KeyKind,
        /// Target table.
        table: String,
        /// The constrained column.
        column: String,
        /// The duplicate value.
        value: String,
    },

    /// A foreign-key value with no matching primary-key row.
    #[error("foreign key value '{value}' in column '{column}' does not exist in table '{ref_table}' column '{ref_column}'")]
    ForeignKeyMissing {
        /// The foreign-key column.
        column: String,
        /// The rejected value.
        value: String,
        /// Referenced table.
        ref_table: String,
        /// Referenced column.
        ref_column: String,
    },

    /// A foreign key referencing a column that is not a primary key.
    #[error("referenced column '{column}' in table '{table}' is not a primary key")]
    ForeignKeyTargetNotPrimary {
        /// Referenced table.
        table: String,
        /// Referenced column.
        column: String,
    },

    /// DELETE blocked because the row's primary key is referenced.
    #[error("cannot delete value '{value}' from table '{table}': referenced by foreign key in table '{ref_table}' column '{ref_column}'")]
    ForeignKeyRestrict {
        /// Table the delete targeted.
        table: String,
        /// The referenced primary-key value.
        value: String,
        /// The referencing table.
        ref_table: String,
        /// The referencing column.
        ref_column: String,
    },

    /// A column name that does not exist in the table.
    #[error("column '{column}' does not exist in table '{table}'")]
    UnknownColumn {
        /// Target table.
        table: String,
        /// The missing column.
        column: String,
    },

    /// A table with no schema file in the active database.
    #[error("table '{table}' not found in database '{db}'")]
    TableNotFound {
        /// The missing table.
        table: String,
        /// The database searched.
        db: String,
    },

    /// A database directory that does not exist.
    #[error("database '{0}' does not exist")]
    DatabaseNotFound(String),

    /// A statement that needs an active database when none is set.
    #[error("no database selected")]
    NoDatabaseSelected,

    /// A data file whose size is not a multiple of the row width.
    #[error("data file '{path}' is corrupt: {size} bytes is not a multiple of the {row_width}-byte row width")]
    CorruptDataFile {
        /// The data file.
        path: PathBuf,
        /// Its size in bytes.
        size: u64,
        /// The table's row width.
        row_width: usize,
    },

    /// A join condition that is not of the form `t1.col = t2.col`.
    #[error("invalid join condition '{0}'")]
    JoinCondition(String),

    /// An underlying file-system failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The commit swap failed after the backup restore was attempted.
    ///
    /// The table named here may be left inconsistent.
    #[error("failed to move committed data for table '{table}' into place")]
    CommitSwap {
        /// The affected table.
        table: String,
    },

    /// BEGIN while a transaction is already active.
    #[error("a transaction is already in progress")]
    TransactionActive,

    /// A transaction operation without an active transaction.
    #[error("no active transaction")]
    NoTransaction,

    /// A checkpoint with an empty identifier.
    #[error("checkpoint id cannot be empty")]
    EmptyCheckpointId,

    /// A checkpoint identifier that already exists.
    #[error("checkpoint '{0}' already exists")]
    DuplicateCheckpoint(String),

    /// A checkpoint identifier that does not exist.
    #[error("checkpoint '{0}' does not exist")]
    UnknownCheckpoint(String),

    /// CREATE DATABASE/TABLE/INDEX inside an active transaction.
    #[error("DDL statements are not allowed inside a transaction")]
    DdlInTransaction,

    /// USE naming a different database inside an active transaction.
    #[error("cannot switch database inside a transaction")]
    DatabaseSwitchInTransaction,
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
