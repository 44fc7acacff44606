//! Table schema model and the line-oriented schema file codec.
//!
//! A table schema is an ordered list of [`Column`]s. Column order is
//! significant: it defines the fixed-width record layout. Schemas are
//! persisted as plain text, one column per line:
//!
//! ```text
//! id INT 10 PRIMARY_KEY INDEXED
//! name STRING(32) NOT_NULL
//! dept_id INT 10 FOREIGN_KEY departments id
//! ```

use std::fmt;

use regex::Regex;

/// Default byte width for `INT` columns: 10 decimal digits of text.
///
/// Kept for on-disk compatibility; integers are stored as decimal text.
pub const DEFAULT_INT_WIDTH: usize = 10;

/// The value type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Integer, stored as decimal text in a fixed-width field.
    Int,
    /// Text with a declared maximum byte width.
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Text => write!(f, "STRING"),
        }
    }
}

/// A foreign-key reference to a primary-key column of another table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignKey {
    /// Referenced table name.
    pub table: String,
    /// Referenced column name (must be that table's primary key).
    pub column: String,
}

/// Schema definition for a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Value type.
    pub ty: ColumnType,
    /// Byte width of the field in a record.
    pub width: usize,
    /// Whether this column is the table's primary key.
    pub primary_key: bool,
    /// Whether this column has a UNIQUE constraint.
    pub unique: bool,
    /// Whether this column rejects empty values.
    pub not_null: bool,
    /// Whether this column has a persistent B+Tree index.
    pub indexed: bool,
    /// Foreign-key reference, if any.
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    /// Creates an `INT` column with the default 10-byte width.
    #[must_use]
    pub fn int(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Int,
            width: DEFAULT_INT_WIDTH,
            primary_key: false,
            unique: false,
            not_null: false,
            indexed: false,
            foreign_key: None,
        }
    }

    /// Creates a `STRING(width)` column.
    #[must_use]
    pub fn text(name: impl Into<String>, width: usize) -> Self {
        Self {
            name: name.into(),
            ty: ColumnType::Text,
            width,
            primary_key: false,
            unique: false,
            not_null: false,
            indexed: false,
            foreign_key: None,
        }
    }

    /// Overrides the field width.
    #[must_use]
    pub fn width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Marks the column as the primary key.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Adds a UNIQUE constraint.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Rejects empty values.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Maintains a persistent index for the column.
    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Adds a foreign-key reference to `table.column`.
    #[must_use]
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// Errors raised while parsing or emitting a schema file.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    /// A line had a column name but no type token.
    #[error("missing type for column '{column}'")]
    MissingType {
        /// The column the line was declaring.
        column: String,
    },

    /// The type token was neither `INT` nor `STRING(N)`.
    #[error("invalid type '{token}' for column '{column}'")]
    UnknownType {
        /// The column the line was declaring.
        column: String,
        /// The offending token.
        token: String,
    },

    /// An `INT` column had no width token, or the width did not parse.
    #[error("missing or invalid width for INT column '{column}'")]
    MissingIntWidth {
        /// The column the line was declaring.
        column: String,
    },

    /// A constraint token was not recognized.
    #[error("invalid constraint '{token}' for column '{column}'")]
    UnknownConstraint {
        /// The column the line was declaring.
        column: String,
        /// The offending token.
        token: String,
    },

    /// `FOREIGN_KEY` was not followed by both reference tokens, or a
    /// foreign-key column was emitted with an empty reference.
    #[error("incomplete FOREIGN_KEY reference for column '{column}'")]
    MissingForeignKeyReference {
        /// The column the line was declaring.
        column: String,
    },
}

/// Parses the text of a schema file into its column list.
///
/// Blank lines are ignored. Any unknown token fails the whole load.
pub fn parse_schema(text: &str) -> Result<Vec<Column>, SchemaError> {
    let string_ty = Regex::new(r"(?i)^STRING\((\d+)\)$").expect("valid type regex");
    let mut columns = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let name = match tokens.next() {
            Some(name) => name.to_string(),
            None => continue,
        };
        let ty_token = tokens.next().ok_or_else(|| SchemaError::MissingType {
            column: name.clone(),
        })?;

        let mut column = if let Some(caps) = string_ty.captures(ty_token) {
            let width = caps[1]
                .parse::<usize>()
                .map_err(|_| SchemaError::UnknownType {
                    column: name.clone(),
                    token: ty_token.to_string(),
                })?;
            Column::text(name.clone(), width)
        } else if ty_token == "INT" {
            let width = tokens
                .next()
                .and_then(|t| t.parse::<usize>().ok())
                .ok_or_else(|| SchemaError::MissingIntWidth {
                    column: name.clone(),
                })?;
            Column::int(name.clone()).width(width)
        } else {
            return Err(SchemaError::UnknownType {
                column: name,
                token: ty_token.to_string(),
            });
        };

        while let Some(token) = tokens.next() {
            match token {
                "PRIMARY_KEY" => column.primary_key = true,
                "UNIQUE_KEY" => column.unique = true,
                "NOT_NULL" => column.not_null = true,
                "INDEXED" => column.indexed = true,
                "FOREIGN_KEY" => {
                    let (ref_table, ref_column) = match (tokens.next(), tokens.next()) {
                        (Some(t), Some(c)) => (t, c),
                        _ => {
                            return Err(SchemaError::MissingForeignKeyReference { column: name })
                        }
                    };
                    column.foreign_key = Some(ForeignKey {
                        table: ref_table.to_string(),
                        column: ref_column.to_string(),
                    });
                }
                _ => {
                    return Err(SchemaError::UnknownConstraint {
                        column: name,
                        token: token.to_string(),
                    })
                }
            }
        }

        columns.push(column);
    }

    Ok(columns)
}

/// Renders a column list back into schema file text.
///
/// The output parses back to an equal column list. A foreign-key column
/// with an empty reference is an error rather than a malformed line.
pub fn emit_schema(columns: &[Column]) -> Result<String, SchemaError> {
    let mut out = String::new();
    for column in columns {
        out.push_str(&column.name);
        match column.ty {
            ColumnType::Text => {
                out.push_str(&format!(" STRING({})", column.width));
            }
            ColumnType::Int => {
                out.push_str(&format!(" INT {}", column.width));
            }
        }
        if column.primary_key {
            out.push_str(" PRIMARY_KEY");
        }
        if let Some(fk) = &column.foreign_key {
            if fk.table.is_empty() || fk.column.is_empty() {
                return Err(SchemaError::MissingForeignKeyReference {
                    column: column.name.clone(),
                });
            }
            out.push_str(&format!(" FOREIGN_KEY {} {}", fk.table, fk.column));
        }
        if column.unique {
            out.push_str(" UNIQUE_KEY");
        }
        if column.not_null {
            out.push_str(" NOT_NULL");
        }
        if column.indexed {
            out.push_str(" INDEXED");
        }
        out.push('\n');
    }
    Ok(out)
}

/// Returns the position of the named column, if present.
#[must_use]
pub fn column_index(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == name)
}

/// Returns the primary-key column and its position, if the table has one.
#[must_use]
pub fn primary_key(columns: &[Column]) -> Option<(usize, &Column)> {
    columns.iter().enumerate().find(|(_, c)| c.primary_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_and_string_columns() {
        let cols = parse_schema("id INT 10 PRIMARY_KEY INDEXED\nname STRING(32) NOT_NULL\n")
            .expect("schema parses");
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "id");
        assert_eq!(cols[0].ty, ColumnType::Int);
        assert_eq!(cols[0].width, 10);
        assert!(cols[0].primary_key);
        assert!(cols[0].indexed);
        assert_eq!(cols[1].ty, ColumnType::Text);
        assert_eq!(cols[1].width, 32);
        assert!(cols[1].not_null);
    }

    #[test]
    fn test_parse_foreign_key() {
        let cols = parse_schema("dept_id INT 10 FOREIGN_KEY departments id\n").unwrap();
        let fk = cols[0].foreign_key.as_ref().expect("has fk");
        assert_eq!(fk.table, "departments");
        assert_eq!(fk.column, "id");
    }

    #[test]
    fn test_parse_string_case_insensitive() {
        let cols = parse_schema("name string(8)\n").unwrap();
        assert_eq!(cols[0].ty, ColumnType::Text);
        assert_eq!(cols[0].width, 8);
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let err = parse_schema("age FLOAT 4\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn test_parse_unknown_constraint_fails() {
        let err = parse_schema("id INT 10 AUTO_INCREMENT\n").unwrap_err();
        assert!(matches!(err, SchemaError::UnknownConstraint { .. }));
    }

    #[test]
    fn test_parse_foreign_key_missing_reference_fails() {
        let err = parse_schema("dept_id INT 10 FOREIGN_KEY departments\n").unwrap_err();
        assert_eq!(
            err,
            SchemaError::MissingForeignKeyReference {
                column: "dept_id".to_string()
            }
        );
    }

    #[test]
    fn test_parse_missing_int_width_fails() {
        let err = parse_schema("id INT\n").unwrap_err();
        assert!(matches!(err, SchemaError::MissingIntWidth { .. }));
    }

    #[test]
    fn test_emit_round_trips() {
        let cols = vec![
            Column::int("id").primary_key().indexed(),
            Column::text("name", 32).not_null().unique(),
            Column::int("dept_id").references("departments", "id"),
        ];
        let text = emit_schema(&cols).unwrap();
        assert_eq!(parse_schema(&text).unwrap(), cols);
    }

    #[test]
    fn test_emit_incomplete_foreign_key_fails() {
        let cols = vec![Column::int("dept_id").references("", "id")];
        assert!(matches!(
            emit_schema(&cols),
            Err(SchemaError::MissingForeignKeyReference { .. })
        ));
    }

    #[test]
    fn test_column_lookup_helpers() {
        let cols = vec![Column::int("id").primary_key(), Column::text("name", 16)];
        assert_eq!(column_index(&cols, "name"), Some(1));
        assert_eq!(column_index(&cols, "missing"), None);
        let (idx, pk) = primary_key(&cols).expect("has pk");
        assert_eq!(idx, 0);
        assert_eq!(pk.name, "id");
    }
}
