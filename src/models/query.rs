//! Query-related data models.
//!
//! Result sets keep the driver's positional shape (`rows` as ordered tuples plus
//! `metaData`), which is what the console's table viewer consumes.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, Serializer};

/// A single cell value read from the source engine.
///
/// The variant records how the value must be rendered when it is replayed as a
/// SQL literal: numbers stay unquoted, text and timestamps are quoted.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    /// Decimal text exactly as the engine formatted it
    Number(String),
    Text(String),
    /// `YYYY-MM-DD HH:MM:SS[.fffffffff]`
    Timestamp(String),
    Binary(Vec<u8>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    pub fn number(value: impl ToString) -> Self {
        Self::Number(value.to_string())
    }

    /// Borrow the value as text, for anything that has a textual form.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(s) | Self::Text(s) | Self::Timestamp(s) => Some(s),
            Self::Null | Self::Binary(_) => None,
        }
    }

    /// Interpret catalog flags such as `1`/`0` or `Y`/`N`.
    pub fn as_flag(&self) -> bool {
        matches!(self.as_str().map(str::trim), Some("1" | "Y" | "YES"))
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_str().and_then(|s| s.trim().parse().ok())
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_str().and_then(|s| s.trim().parse().ok())
    }
}

impl Serialize for SqlValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Number(n) => {
                if let Ok(i) = n.parse::<i64>() {
                    serializer.serialize_i64(i)
                } else if let Ok(f) = n.parse::<f64>() {
                    serializer.serialize_f64(f)
                } else {
                    serializer.serialize_str(n)
                }
            }
            Self::Text(s) | Self::Timestamp(s) => serializer.serialize_str(s),
            Self::Binary(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    pub name: String,
    /// Engine type name (e.g., "NUMBER(10,2)", "VARCHAR2(50)")
    pub db_type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, db_type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_type_name: db_type_name.into(),
        }
    }
}

/// Result of one statement: rows in engine order plus column metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSet {
    pub meta_data: Vec<ColumnMetadata>,
    pub rows: Vec<Vec<SqlValue>>,
    /// Set for statements that do not return rows
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
}

impl RowSet {
    pub fn new(meta_data: Vec<ColumnMetadata>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            meta_data,
            rows,
            rows_affected: None,
        }
    }

    /// Result of a DDL/DML statement.
    pub fn affected(rows_affected: u64) -> Self {
        Self {
            meta_data: Vec::new(),
            rows: Vec::new(),
            rows_affected: Some(rows_affected),
        }
    }

    /// A one-row, one-column result.
    pub fn single(column: impl Into<String>, type_name: &str, value: SqlValue) -> Self {
        Self::new(
            vec![ColumnMetadata::new(column, type_name)],
            vec![vec![value]],
        )
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Text of the first column of every row, skipping NULLs.
    pub fn first_column(&self) -> Vec<String> {
        self.column(0)
    }

    /// Text of the column at `index` for every row, skipping NULLs.
    pub fn column(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(index))
            .filter_map(|value| value.as_str().map(String::from))
            .collect()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.meta_data.iter().map(|c| c.name.as_str()).collect()
    }
}
