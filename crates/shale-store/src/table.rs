//! File-backed tables with constraint enforcement.
//!
//! A table owns a header-less data file of fixed-width records, a text
//! schema, and one persistent B+Tree per `INDEXED` column. Inserts
//! append; updates and deletes rewrite the whole file. Every mutation
//! validates before the data file is opened for writing, so a failed
//! operation leaves all files byte-identical.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info, warn};

use shale_core::expr::{self, CmpOp, ExprError, Predicate};
use shale_core::record::{decode_row, encode_row, row_width};
use shale_core::schema::{self, emit_schema, parse_schema, Column, ColumnType};

use crate::catalog::Catalog;
use crate::error::{KeyKind, Result, StoreError};
use crate::index::BPlusTree;

/// Whether a mutation maintains the table's indexes as it runs.
///
/// Transactions apply their log against staged temp files; touching
/// the live trees at that point would leave them pointing at data that
/// may never be committed, so index maintenance is deferred and the
/// affected tables are rebuilt after the commit swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexMaintenance {
    /// Maintain indexes as part of the operation.
    Live,
    /// Leave the trees untouched; uniqueness checks fall back to
    /// scanning the target file.
    Deferred,
}

/// A loaded table: columns, data file, and open indexes.
#[derive(Debug)]
pub struct Table {
    name: String,
    db: String,
    columns: Vec<Column>,
    catalog: Catalog,
    indexes: HashMap<String, BPlusTree>,
}

impl Table {
    /// Creates a table in a database: validates foreign-key targets,
    /// creates the database directories and an empty data file, and
    /// writes the schema.
    ///
    /// Each foreign key must reference the primary-key column of an
    /// existing table (or of this table itself).
    pub fn create(name: &str, columns: Vec<Column>, db: &str, catalog: &Catalog) -> Result<Self> {
        for column in &columns {
            let Some(fk) = &column.foreign_key else {
                continue;
            };
            let ref_columns;
            let target: &[Column] = if fk.table == name {
                &columns
            } else {
                let schema_path = catalog.schema_file(db, &fk.table);
                let text = fs::read_to_string(&schema_path).map_err(|_| {
                    StoreError::TableNotFound {
                        table: fk.table.clone(),
                        db: db.to_string(),
                    }
                })?;
                ref_columns = parse_schema(&text)?;
                &ref_columns
            };
            let Some(ref_col) = target.iter().find(|c| c.name == fk.column) else {
                return Err(StoreError::UnknownColumn {
                    table: fk.table.clone(),
                    column: fk.column.clone(),
                });
            };
            if !ref_col.primary_key {
                return Err(StoreError::ForeignKeyTargetNotPrimary {
                    table: fk.table.clone(),
                    column: fk.column.clone(),
                });
            }
        }

        catalog.ensure_database(db)?;
        // Touch the data file without truncating an existing one.
        OpenOptions::new()
            .append(true)
            .create(true)
            .open(catalog.data_file(db, name))?;

        let mut table = Self {
            name: name.to_string(),
            db: db.to_string(),
            columns,
            catalog: catalog.clone(),
            indexes: HashMap::new(),
        };
        table.save_schema()?;
        for column in &table.columns {
            if column.indexed {
                table
                    .indexes
                    .insert(column.name.clone(), BPlusTree::new(column.ty));
            }
        }
        info!(table = %table.name, db = %table.db, "created table");
        Ok(table)
    }

    /// Loads a table from its schema file and attaches the index of
    /// every `INDEXED` column (an empty tree when the sidecar is
    /// missing or unreadable).
    pub fn load(name: &str, db: &str, catalog: &Catalog) -> Result<Self> {
        let schema_path = catalog.schema_file(db, name);
        let text = fs::read_to_string(&schema_path).map_err(|_| StoreError::TableNotFound {
            table: name.to_string(),
            db: db.to_string(),
        })?;
        let columns = parse_schema(&text)?;

        let mut table = Self {
            name: name.to_string(),
            db: db.to_string(),
            columns,
            catalog: catalog.clone(),
            indexes: HashMap::new(),
        };
        let indexed: Vec<(String, ColumnType)> = table
            .columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| (c.name.clone(), c.ty))
            .collect();
        for (column, ty) in indexed {
            table.load_index(&column, ty);
        }
        Ok(table)
    }

    /// Table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column definitions, in record order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Byte width of one record.
    #[must_use]
    pub fn row_width(&self) -> usize {
        row_width(&self.columns)
    }

    /// Path of the live data file.
    #[must_use]
    pub fn data_path(&self) -> PathBuf {
        self.catalog.data_file(&self.db, &self.name)
    }

    /// The open index for a column, if it has one.
    #[must_use]
    pub fn index(&self, column: &str) -> Option<&BPlusTree> {
        self.indexes.get(column)
    }

    /// Inserts one row into the live data file.
    pub fn insert(&mut self, values: &[String]) -> Result<()> {
        let path = self.data_path();
        self.insert_into(values, &path, IndexMaintenance::Live)
    }

    /// Inserts one row into the data file at `path`.
    ///
    /// Validates arity, NOT_NULL, type fit, primary-key/UNIQUE
    /// collisions, and foreign-key existence before any byte is
    /// written. The record's offset is the pre-append file size; in
    /// [`IndexMaintenance::Live`] mode each indexed column's tree gains
    /// the new entry and is saved.
    pub fn insert_into(
        &mut self,
        values: &[String],
        path: &Path,
        mode: IndexMaintenance,
    ) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(StoreError::Arity {
                table: self.name.clone(),
                expected: self.columns.len(),
                got: values.len(),
            });
        }

        for (i, (column, value)) in self.columns.iter().zip(values).enumerate() {
            if column.not_null && value.is_empty() {
                return Err(StoreError::NullViolation {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
            self.validate_type(column, value)?;

            if column.primary_key || column.unique {
                let kind = if column.primary_key {
                    KeyKind::Primary
                } else {
                    KeyKind::Unique
                };
                let duplicate = match self.indexes.get(&column.name) {
                    Some(tree) if mode == IndexMaintenance::Live => !tree.search(value).is_empty(),
                    _ => self.column_contains(path, i, value)?,
                };
                if duplicate {
                    return Err(StoreError::DuplicateKey {
                        kind,
                        table: self.name.clone(),
                        column: column.name.clone(),
                        value: value.clone(),
                    });
                }
            }

            if let Some(fk) = &column.foreign_key {
                // An empty value on a nullable column carries no reference.
                if !(value.is_empty() && !column.not_null) {
                    self.check_foreign_key(&fk.table, &fk.column, value)?;
                }
            }
        }

        let row = encode_row(&self.columns, values)?;
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        let offset = file.metadata()?.len();
        file.write_all(&row)?;
        drop(file);

        if mode == IndexMaintenance::Live {
            for (column, value) in self.columns.iter().zip(values) {
                if column.indexed {
                    if let Some(tree) = self.indexes.get_mut(&column.name) {
                        tree.insert(value, offset);
                    }
                }
            }
            let indexed: Vec<String> = self
                .columns
                .iter()
                .filter(|c| c.indexed)
                .map(|c| c.name.clone())
                .collect();
            for column in indexed {
                self.save_index(&column)?;
            }
        }

        debug!(table = %self.name, offset, "inserted row");
        Ok(())
    }

    /// Reads every row of the live data file.
    pub fn select_all(&self) -> Result<Vec<Vec<String>>> {
        self.read_rows(&self.data_path())
    }

    /// Reads the rows where `column <op> value`.
    ///
    /// With `op` `=` on an indexed column this is a point lookup that
    /// seeks straight to the matching records; otherwise it is a
    /// sequential scan with type-aware comparison (rows whose `INT`
    /// field does not parse are skipped).
    pub fn select_where(&self, column: &str, op: &str, value: &str) -> Result<Vec<Vec<String>>> {
        let col_index =
            schema::column_index(&self.columns, column).ok_or_else(|| StoreError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })?;
        let cmp = CmpOp::parse(op).ok_or_else(|| ExprError::UnknownOperator(op.to_string()))?;

        if cmp == CmpOp::Eq {
            if let Some(tree) = self.indexes.get(column) {
                let offsets = tree.search(value);
                debug!(table = %self.name, column, hits = offsets.len(), "index lookup");
                return self.read_rows_at(&self.data_path(), &offsets);
            }
        }

        let numeric = if self.columns[col_index].ty == ColumnType::Int {
            Some(
                value
                    .parse::<i64>()
                    .map_err(|_| StoreError::InvalidInt {
                        table: self.name.clone(),
                        column: column.to_string(),
                        value: value.to_string(),
                    })?,
            )
        } else {
            None
        };

        let mut matches = Vec::new();
        for row in self.read_rows(&self.data_path())? {
            let field = &row[col_index];
            let keep = match numeric {
                Some(rhs) => match field.parse::<i64>() {
                    Ok(lhs) => cmp.matches(lhs.cmp(&rhs)),
                    Err(_) => continue,
                },
                None => cmp.matches(field.as_bytes().cmp(value.as_bytes())),
            };
            if keep {
                matches.push(row);
            }
        }
        Ok(matches)
    }

    /// Reads the rows matching a predicate; an empty predicate matches
    /// every row.
    pub fn select_where_expr(&self, predicate: &str) -> Result<Vec<Vec<String>>> {
        let compiled = Predicate::compile(predicate, &self.columns)?;
        let mut matches = Vec::new();
        for row in self.read_rows(&self.data_path())? {
            if compiled.matches(&row)? {
                matches.push(row);
            }
        }
        Ok(matches)
    }

    /// Equi-joins this table with another on `self.col = other.col`.
    ///
    /// The condition must name the two tables in order. When this
    /// table's join column is indexed, each row of the other table is
    /// matched by point lookup; otherwise a nested loop compares the
    /// fields under the engine's comparison rule. Output rows are this
    /// table's tuple followed by the other's.
    pub fn select_join(
        &self,
        other: &Table,
        condition: &str,
    ) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let pattern =
            Regex::new(r"^\s*(\w+)\.(\w+)\s*=\s*(\w+)\.(\w+)\s*$").expect("valid join regex");
        let caps = pattern
            .captures(condition)
            .ok_or_else(|| StoreError::JoinCondition(condition.to_string()))?;
        if &caps[1] != self.name || &caps[3] != other.name {
            return Err(StoreError::JoinCondition(condition.to_string()));
        }
        let left_col =
            schema::column_index(&self.columns, &caps[2]).ok_or_else(|| StoreError::UnknownColumn {
                table: self.name.clone(),
                column: caps[2].to_string(),
            })?;
        let right_col = schema::column_index(&other.columns, &caps[4]).ok_or_else(|| {
            StoreError::UnknownColumn {
                table: other.name.clone(),
                column: caps[4].to_string(),
            }
        })?;

        let headers: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{}.{}", self.name, c.name))
            .chain(
                other
                    .columns
                    .iter()
                    .map(|c| format!("{}.{}", other.name, c.name)),
            )
            .collect();

        let right_rows = other.select_all()?;
        let mut joined = Vec::new();

        if let Some(tree) = self.indexes.get(&self.columns[left_col].name) {
            debug!(table = %self.name, other = %other.name, "indexed join");
            for right_row in &right_rows {
                let offsets = tree.search(&right_row[right_col]);
                if offsets.is_empty() {
                    continue;
                }
                for left_row in self.read_rows_at(&self.data_path(), &offsets)? {
                    let mut combined = left_row;
                    combined.extend(right_row.iter().cloned());
                    joined.push(combined);
                }
            }
        } else {
            debug!(table = %self.name, other = %other.name, "nested-loop join");
            for left_row in self.select_all()? {
                for right_row in &right_rows {
                    if expr::compare_values(&left_row[left_col], CmpOp::Eq, &right_row[right_col]) {
                        let mut combined = left_row.clone();
                        combined.extend(right_row.iter().cloned());
                        joined.push(combined);
                    }
                }
            }
        }

        Ok((headers, joined))
    }

    /// Updates one column on every row matching the predicate.
    pub fn update(&mut self, column: &str, new_value: &str, predicate: &str) -> Result<usize> {
        let path = self.data_path();
        self.update_at(column, new_value, predicate, &path, IndexMaintenance::Live)
    }

    /// Updates against the data file at `path`.
    ///
    /// The predicate must be non-empty and reference only known
    /// columns; the new value is validated like an insert, including
    /// foreign-key existence when the column is a foreign key. The
    /// whole file is rewritten; in live mode every index is rebuilt
    /// when at least one row changed. Returns the changed-row count.
    pub fn update_at(
        &mut self,
        column: &str,
        new_value: &str,
        predicate: &str,
        path: &Path,
        mode: IndexMaintenance,
    ) -> Result<usize> {
        let col_index =
            schema::column_index(&self.columns, column).ok_or_else(|| StoreError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })?;

        let target = self.columns[col_index].clone();
        if target.not_null && new_value.is_empty() {
            return Err(StoreError::NullViolation {
                table: self.name.clone(),
                column: target.name.clone(),
            });
        }
        self.validate_type(&target, new_value)?;
        if let Some(fk) = &target.foreign_key {
            if !(new_value.is_empty() && !target.not_null) {
                self.check_foreign_key(&fk.table, &fk.column, new_value)?;
            }
        }

        if predicate.trim().is_empty() {
            return Err(ExprError::Empty.into());
        }
        let compiled = Predicate::compile(predicate, &self.columns)?;

        let mut rows = self.read_rows_checked(path)?;
        let mut changed = 0;
        for row in &mut rows {
            if compiled.matches(row)? {
                row[col_index] = new_value.to_string();
                changed += 1;
            }
        }
        self.rewrite_rows(path, &rows)?;

        if changed > 0 && mode == IndexMaintenance::Live {
            self.rebuild_indexes()?;
        }
        debug!(table = %self.name, rows = changed, "updated rows");
        Ok(changed)
    }

    /// Deletes every row matching the predicate.
    pub fn delete_where(&mut self, predicate: &str) -> Result<usize> {
        let path = self.data_path();
        self.delete_where_at(predicate, &path, IndexMaintenance::Live)
    }

    /// Deletes against the data file at `path`.
    ///
    /// The predicate must be non-empty. Before anything is rewritten,
    /// every to-be-deleted row whose primary-key value is referenced by
    /// a foreign key in a sibling table fails the whole operation, so a
    /// rejected delete leaves the file byte-identical. Returns the
    /// deleted-row count.
    pub fn delete_where_at(
        &mut self,
        predicate: &str,
        path: &Path,
        mode: IndexMaintenance,
    ) -> Result<usize> {
        if predicate.trim().is_empty() {
            return Err(ExprError::Empty.into());
        }
        let compiled = Predicate::compile(predicate, &self.columns)?;

        let rows = self.read_rows_checked(path)?;
        let mut doomed = Vec::with_capacity(rows.len());
        for row in &rows {
            doomed.push(compiled.matches(row)?);
        }

        if let Some((pk_index, _)) = schema::primary_key(&self.columns) {
            for (row, &gone) in rows.iter().zip(&doomed) {
                if !gone {
                    continue;
                }
                if let Some((ref_table, ref_column)) =
                    self.find_inbound_reference(pk_index, &row[pk_index])?
                {
                    return Err(StoreError::ForeignKeyRestrict {
                        table: self.name.clone(),
                        value: row[pk_index].clone(),
                        ref_table,
                        ref_column,
                    });
                }
            }
        }

        let remaining: Vec<Vec<String>> = rows
            .into_iter()
            .zip(&doomed)
            .filter(|(_, &gone)| !gone)
            .map(|(row, _)| row)
            .collect();
        let deleted = doomed.iter().filter(|&&gone| gone).count();
        self.rewrite_rows(path, &remaining)?;

        if deleted > 0 && mode == IndexMaintenance::Live {
            self.rebuild_indexes()?;
        }
        debug!(table = %self.name, rows = deleted, "deleted rows");
        Ok(deleted)
    }

    /// Builds a persistent index over a column: flags the column,
    /// bulk-loads the tree from the data file, saves the sidecar, and
    /// rewrites the schema.
    pub fn create_index(&mut self, column: &str) -> Result<()> {
        let col_index =
            schema::column_index(&self.columns, column).ok_or_else(|| StoreError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })?;
        self.columns[col_index].indexed = true;
        let ty = self.columns[col_index].ty;
        self.indexes.insert(column.to_string(), BPlusTree::new(ty));
        self.rebuild_index(column)?;
        self.save_schema()?;
        info!(table = %self.name, column, "created index");
        Ok(())
    }

    /// Rebuilds every indexed column's tree from the live data file.
    pub fn rebuild_indexes(&mut self) -> Result<()> {
        let indexed: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| c.name.clone())
            .collect();
        for column in indexed {
            self.rebuild_index(&column)?;
        }
        Ok(())
    }

    fn rebuild_index(&mut self, column: &str) -> Result<()> {
        let Some(col_index) = schema::column_index(&self.columns, column) else {
            return Ok(());
        };
        if !self.indexes.contains_key(column) {
            return Ok(());
        }

        let width = self.row_width();
        let rows = self.read_rows(&self.data_path())?;
        if let Some(tree) = self.indexes.get_mut(column) {
            tree.clear();
            for (i, row) in rows.iter().enumerate() {
                tree.insert(&row[col_index], (i * width) as u64);
            }
        }
        self.save_index(column)
    }

    fn save_index(&self, column: &str) -> Result<()> {
        let Some(tree) = self.indexes.get(column) else {
            return Ok(());
        };
        let path = self.catalog.index_file(&self.db, &self.name, column);
        let mut file = fs::File::create(&path)?;
        tree.save(&mut file)?;
        Ok(())
    }

    fn load_index(&mut self, column: &str, ty: ColumnType) {
        let path = self.catalog.index_file(&self.db, &self.name, column);
        let tree = match fs::File::open(&path) {
            Ok(mut file) => BPlusTree::load(ty, &mut file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BPlusTree::new(ty),
            Err(e) => {
                warn!(index = %path.display(), error = %e, "could not open index file");
                BPlusTree::new(ty)
            }
        };
        self.indexes.insert(column.to_string(), tree);
    }

    fn save_schema(&self) -> Result<()> {
        let text = emit_schema(&self.columns)?;
        fs::write(self.catalog.schema_file(&self.db, &self.name), text)?;
        Ok(())
    }

    fn validate_type(&self, column: &Column, value: &str) -> Result<()> {
        if column.ty == ColumnType::Int && !value.is_empty() && value.parse::<i64>().is_err() {
            return Err(StoreError::InvalidInt {
                table: self.name.clone(),
                column: column.name.clone(),
                value: value.to_string(),
            });
        }
        if value.len() > column.width {
            return Err(StoreError::ValueTooWide {
                table: self.name.clone(),
                column: column.name.clone(),
                value: value.to_string(),
                width: column.width,
            });
        }
        Ok(())
    }

    /// Validates that `value` exists as a primary-key value of the
    /// referenced table, via its index when present, else by scan.
    fn check_foreign_key(&self, ref_table: &str, ref_column: &str, value: &str) -> Result<()> {
        let referenced = Table::load(ref_table, &self.db, &self.catalog)?;
        let Some(col_index) = schema::column_index(&referenced.columns, ref_column) else {
            return Err(StoreError::UnknownColumn {
                table: ref_table.to_string(),
                column: ref_column.to_string(),
            });
        };
        if !referenced.columns[col_index].primary_key {
            return Err(StoreError::ForeignKeyTargetNotPrimary {
                table: ref_table.to_string(),
                column: ref_column.to_string(),
            });
        }

        let exists = match referenced.indexes.get(ref_column) {
            Some(tree) => !tree.search(value).is_empty(),
            None => referenced
                .select_all()?
                .iter()
                .any(|row| row[col_index] == value),
        };
        if exists {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyMissing {
                column: ref_column.to_string(),
                value: value.to_string(),
                ref_table: ref_table.to_string(),
                ref_column: ref_column.to_string(),
            })
        }
    }

    /// Looks for a sibling table whose foreign key references this
    /// table's primary key with the given value. Sibling tables that
    /// fail to load are skipped.
    fn find_inbound_reference(
        &self,
        pk_index: usize,
        pk_value: &str,
    ) -> Result<Option<(String, String)>> {
        let pk_name = &self.columns[pk_index].name;
        for sibling_name in self.catalog.table_names(&self.db)? {
            if sibling_name == self.name {
                continue;
            }
            let sibling = match Table::load(&sibling_name, &self.db, &self.catalog) {
                Ok(table) => table,
                Err(e) => {
                    warn!(table = %sibling_name, error = %e, "skipping unreadable sibling table");
                    continue;
                }
            };
            for (i, column) in sibling.columns.iter().enumerate() {
                let Some(fk) = &column.foreign_key else {
                    continue;
                };
                if fk.table != self.name || fk.column != *pk_name {
                    continue;
                }
                let referenced = match sibling.indexes.get(&column.name) {
                    Some(tree) => !tree.search(pk_value).is_empty(),
                    None => sibling.select_all()?.iter().any(|row| row[i] == pk_value),
                };
                if referenced {
                    return Ok(Some((sibling_name, column.name.clone())));
                }
            }
        }
        Ok(None)
    }

    /// True when any row's field at `col_index` equals `value`.
    fn column_contains(&self, path: &Path, col_index: usize, value: &str) -> Result<bool> {
        Ok(self
            .read_rows(path)?
            .iter()
            .any(|row| row[col_index] == value))
    }

    /// Sequentially decodes every row; a missing file is an empty table.
    fn read_rows(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let width = self.row_width();
        if width == 0 {
            return Ok(Vec::new());
        }
        Ok(bytes
            .chunks_exact(width)
            .map(|chunk| decode_row(&self.columns, chunk))
            .collect())
    }

    /// Like [`Table::read_rows`], but the file must exist and its size
    /// must be an exact multiple of the row width.
    fn read_rows_checked(&self, path: &Path) -> Result<Vec<Vec<String>>> {
        let bytes = fs::read(path)?;
        let width = self.row_width();
        if width == 0 {
            return Ok(Vec::new());
        }
        if bytes.len() % width != 0 {
            return Err(StoreError::CorruptDataFile {
                path: path.to_path_buf(),
                size: bytes.len() as u64,
                row_width: width,
            });
        }
        Ok(bytes
            .chunks_exact(width)
            .map(|chunk| decode_row(&self.columns, chunk))
            .collect())
    }

    /// Seeks to each offset and decodes one record. Offsets past the
    /// end of the file (a stale index) are skipped.
    fn read_rows_at(&self, path: &Path, offsets: &[u64]) -> Result<Vec<Vec<String>>> {
        if offsets.is_empty() {
            return Ok(Vec::new());
        }
        let mut file = fs::File::open(path)?;
        let width = self.row_width();
        let mut buf = vec![0u8; width];
        let mut rows = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            file.seek(SeekFrom::Start(offset))?;
            match file.read_exact(&mut buf) {
                Ok(()) => rows.push(decode_row(&self.columns, &buf)),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!(table = %self.name, offset, "skipping stale index offset");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(rows)
    }

    /// Rewrites the whole data file from decoded rows.
    fn rewrite_rows(&self, path: &Path, rows: &[Vec<String>]) -> Result<()> {
        let mut buf = Vec::with_capacity(rows.len() * self.row_width());
        for row in rows {
            buf.extend_from_slice(&encode_row(&self.columns, row)?);
        }
        fs::write(path, buf)?;
        Ok(())
    }
}
