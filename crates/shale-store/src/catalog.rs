//! Database directory layout.
//!
//! Every database is a directory under one root:
//!
//! ```text
//! <root>/<db>/data/<table>.db            raw fixed-width records
//! <root>/<db>/data/<table>.schema        column definitions, one per line
//! <root>/<db>/data/<table>.<column>.idx  persisted B+Tree index
//! ```
//!
//! A [`Catalog`] is a plain value holding the root path; handles are
//! cheap to clone and passed explicitly wherever cross-table lookups
//! (foreign keys, transaction staging) are needed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Resolves database, table, and index names to paths under one root.
#[derive(Debug, Clone)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    /// Creates a catalog rooted at the given directory.
    ///
    /// The directory does not have to exist yet; it is created by the
    /// first [`Catalog::ensure_database`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The catalog root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<db>`.
    #[must_use]
    pub fn database_path(&self, db: &str) -> PathBuf {
        self.root.join(db)
    }

    /// `<root>/<db>/data`.
    #[must_use]
    pub fn data_dir(&self, db: &str) -> PathBuf {
        self.database_path(db).join("data")
    }

    /// Path of a table's record file.
    #[must_use]
    pub fn data_file(&self, db: &str, table: &str) -> PathBuf {
        self.data_dir(db).join(format!("{table}.db"))
    }

    /// Path of a table's staged copy during a transaction commit.
    #[must_use]
    pub fn temp_file(&self, db: &str, table: &str) -> PathBuf {
        self.data_dir(db).join(format!("{table}.db.temp"))
    }

    /// Path of the short-lived backup taken during the commit swap.
    #[must_use]
    pub fn backup_file(&self, db: &str, table: &str) -> PathBuf {
        self.data_dir(db).join(format!("{table}.db.bak"))
    }

    /// Path of a table's schema file.
    #[must_use]
    pub fn schema_file(&self, db: &str, table: &str) -> PathBuf {
        self.data_dir(db).join(format!("{table}.schema"))
    }

    /// Path of a column's index file.
    #[must_use]
    pub fn index_file(&self, db: &str, table: &str, column: &str) -> PathBuf {
        self.data_dir(db).join(format!("{table}.{column}.idx"))
    }

    /// Creates the database directory chain; succeeds if it exists.
    pub fn ensure_database(&self, db: &str) -> io::Result<()> {
        fs::create_dir_all(self.data_dir(db))
    }

    /// True when the database directory exists.
    #[must_use]
    pub fn database_exists(&self, db: &str) -> bool {
        self.data_dir(db).is_dir()
    }

    /// True when the table's schema file exists.
    #[must_use]
    pub fn table_exists(&self, db: &str, table: &str) -> bool {
        self.schema_file(db, table).is_file()
    }

    /// Names of every table in a database, from its `*.schema` files,
    /// sorted. A missing database directory yields an empty list.
    pub fn table_names(&self, db: &str) -> io::Result<Vec<String>> {
        let entries = match fs::read_dir(self.data_dir(db)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "schema") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
