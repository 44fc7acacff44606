//! # shale-store
//!
//! The storage layer of the shale engine: a single-node, file-backed
//! relational store. Each database is a directory of flat record
//! files with sidecar schemas and disk-persisted B+Tree indexes.
//!
//! - [`catalog`]: maps database/table/column names to paths under one
//!   explicit root
//! - [`index`]: the order-4 B+Tree multimap from column values to
//!   record offsets
//! - [`table`]: scan/insert/update/delete/join with primary-key,
//!   unique, not-null, and foreign-key enforcement
//! - [`txn`]: copy-on-write transactions with named savepoints and
//!   atomic stage/apply/swap commit
//! - [`session`]: the statement dispatcher embedders drive
//!
//! The engine is single-threaded and blocking by design; embedders
//! exposing it to multiple threads must serialize access externally.
//!
//! ```no_run
//! use shale_core::{Column, Statement};
//! use shale_store::{Catalog, QueryResult, Session};
//!
//! # fn main() -> shale_store::Result<()> {
//! let mut session = Session::new(Catalog::new("databases"));
//! session.execute(Statement::CreateDatabase { name: "shop".into() })?;
//! session.execute(Statement::UseDatabase { name: "shop".into() })?;
//! session.execute(Statement::CreateTable {
//!     name: "orders".into(),
//!     columns: vec![
//!         Column::int("id").primary_key().indexed(),
//!         Column::text("item", 32).not_null(),
//!     ],
//! })?;
//! session.execute(Statement::Insert {
//!     table: "orders".into(),
//!     values: vec!["1".into(), "keyboard".into()],
//! })?;
//! let result = session.execute(Statement::SelectWhere {
//!     table: "orders".into(),
//!     predicate: "id = 1".into(),
//! })?;
//! if let QueryResult::Rows { rows, .. } = result {
//!     assert_eq!(rows.len(), 1);
//! }
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod index;
pub mod session;
pub mod table;
pub mod txn;

pub use catalog::Catalog;
pub use error::{KeyKind, Result, StoreError};
pub use index::BPlusTree;
pub use session::{QueryResult, Session};
pub use table::{IndexMaintenance, Table};
pub use txn::{LogEntry, Operation, Transaction};
