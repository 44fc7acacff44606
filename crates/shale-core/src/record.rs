//! Fixed-width record codec.
//!
//! A row is the concatenation of each column's value right-padded with
//! NUL bytes to the column width. Data files have no header, so a row's
//! byte offset is always `row index × row width`.

use crate::schema::{Column, ColumnType};

/// Errors raised while encoding a row.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    /// The value list does not match the column count.
    #[error("expected {expected} values, got {got}")]
    ArityMismatch {
        /// Number of columns in the schema.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },

    /// A value is longer than its column's field width.
    #[error("value '{value}' exceeds the {width}-byte width of column '{column}'")]
    ValueTooWide {
        /// The column being encoded.
        column: String,
        /// The oversized value.
        value: String,
        /// The column's declared width.
        width: usize,
    },
}

/// Total byte width of one row.
#[must_use]
pub fn row_width(columns: &[Column]) -> usize {
    columns.iter().map(|c| c.width).sum()
}

/// Byte offset of a column's field within a row.
#[must_use]
pub fn field_offset(columns: &[Column], index: usize) -> usize {
    columns[..index].iter().map(|c| c.width).sum()
}

/// Encodes one row; no byte is produced if any value is oversized.
pub fn encode_row(columns: &[Column], values: &[String]) -> Result<Vec<u8>, RecordError> {
    if values.len() != columns.len() {
        return Err(RecordError::ArityMismatch {
            expected: columns.len(),
            got: values.len(),
        });
    }
    for (column, value) in columns.iter().zip(values) {
        if value.len() > column.width {
            return Err(RecordError::ValueTooWide {
                column: column.name.clone(),
                value: value.clone(),
                width: column.width,
            });
        }
    }

    let mut row = Vec::with_capacity(row_width(columns));
    for (column, value) in columns.iter().zip(values) {
        row.extend_from_slice(value.as_bytes());
        row.resize(row.len() + (column.width - value.len()), 0);
    }
    Ok(row)
}

/// Decodes one row-width buffer into per-column values.
///
/// Each field is truncated at its first NUL byte; `STRING` fields also
/// drop trailing spaces, for compatibility with space-padded rows.
#[must_use]
pub fn decode_row(columns: &[Column], bytes: &[u8]) -> Vec<String> {
    debug_assert_eq!(bytes.len(), row_width(columns));

    let mut values = Vec::with_capacity(columns.len());
    let mut offset = 0;
    for column in columns {
        let field = &bytes[offset..offset + column.width];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let mut value = String::from_utf8_lossy(&field[..end]).into_owned();
        if column.ty == ColumnType::Text {
            let trimmed = value.trim_end_matches(' ').len();
            value.truncate(trimmed);
        }
        values.push(value);
        offset += column.width;
    }
    values
}
