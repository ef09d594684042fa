//! Cross-engine type mapping and SQL text rendering.
//!
//! Everything here is pure: translating a source column to its target type,
//! rendering a [`SqlValue`] as a literal, and producing identifiers that are
//! safe in generated statements and diagram labels.

use crate::models::SqlValue;

/// Precision used for a scaled NUMBER declared without one.
pub const MAX_NUMERIC_PRECISION: u32 = 38;

/// A column definition read from the source catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceColumn {
    pub name: String,
    pub data_type: String,
    pub data_length: Option<u32>,
    /// Declared character length, when the type is character-semantic
    pub char_length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<i32>,
    pub nullable: bool,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            data_length: None,
            char_length: None,
            precision: None,
            scale: None,
            nullable: true,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.data_length = Some(length);
        self.char_length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<i32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    fn declared_length(&self) -> Option<u32> {
        self.char_length
            .filter(|len| *len > 0)
            .or(self.data_length.filter(|len| *len > 0))
    }

    /// Target type for this column.
    ///
    /// NUMBER keeps its declared precision; a positive scale gives a
    /// fixed-precision decimal, otherwise an unscaled one. Character types
    /// keep their declared length. Unknown types pass through unchanged.
    pub fn target_type(&self) -> String {
        let base = self.data_type.trim().to_uppercase();
        match base.as_str() {
            "NUMBER" => match (self.precision, self.scale) {
                (p, Some(s)) if s > 0 => {
                    format!("NUMERIC({},{})", p.unwrap_or(MAX_NUMERIC_PRECISION), s)
                }
                (Some(p), _) => format!("NUMERIC({})", p),
                (None, _) => "NUMERIC".to_string(),
            },
            "VARCHAR2" | "NVARCHAR2" => self.sized("VARCHAR"),
            "CHAR" | "NCHAR" => self.sized("CHAR"),
            "DATE" => "TIMESTAMP".to_string(),
            "CLOB" | "NCLOB" => "TEXT".to_string(),
            "BLOB" => "BYTEA".to_string(),
            _ => self.data_type.trim().to_string(),
        }
    }

    fn sized(&self, name: &str) -> String {
        match self.declared_length() {
            Some(len) => format!("{}({})", name, len),
            None => name.to_string(),
        }
    }

    /// `"name" TYPE [NOT NULL]` for a target CREATE TABLE.
    pub fn target_definition(&self) -> String {
        let mut def = format!("{} {}", quote_ident(&self.name), self.target_type());
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        def
    }
}

/// Render a value as a target SQL literal.
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Number(n) => n.clone(),
        SqlValue::Text(s) | SqlValue::Timestamp(s) => quote_literal(s),
        SqlValue::Binary(bytes) => format!("decode('{}', 'hex')", hex::encode(bytes)),
    }
}

/// Single-quote `s`, doubling embedded quotes.
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Target identifier: lower-cased and double-quoted.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.to_lowercase().replace('"', "\"\""))
}

/// Source identifier: exact case, double-quoted.
pub fn quote_source_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Replace every character outside `[A-Za-z0-9_]` with `_`.
///
/// Node ids, edge endpoints and Mermaid entity names all go through this one
/// function; the output is a fixed point.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
