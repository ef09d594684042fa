//! Table, view and program-unit operations behind the console's object
//! browser and its create/drop dialogs.

use crate::db::{
    CatalogQuery, SourceConnection, SourceConnector, fetch, quote_source_ident, release,
};
use crate::error::{DbError, DbResult};
use crate::models::{RowSet, SourceDescriptor, SqlValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::tree::distinct;

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    use crate::db::CatalogQuery;

    pub const COLUMNS: CatalogQuery = CatalogQuery::new(
        "SELECT column_name, nullable, data_type, data_default \
         FROM dba_tab_columns WHERE table_name = :1",
        "SELECT column_name, nullable, data_type, data_default \
         FROM all_tab_columns WHERE table_name = :1",
    );

    pub const SOURCE_LINES: CatalogQuery = CatalogQuery::new(
        "SELECT text FROM dba_source WHERE name = :1 AND owner = :2 ORDER BY type, line",
        "SELECT text FROM all_source WHERE name = :1 AND owner = :2 ORDER BY type, line",
    );

    pub const DATA_TYPES: CatalogQuery = CatalogQuery::new(
        "SELECT DISTINCT data_type AS type_name FROM dba_tab_columns \
         WHERE owner NOT IN ('SYS', 'SYSTEM') ORDER BY type_name",
        "SELECT DISTINCT data_type AS type_name FROM all_tab_columns \
         WHERE owner NOT IN ('SYS', 'SYSTEM') ORDER BY type_name",
    );
}

const TABLE_NAMES: CatalogQuery = super::tree::queries::TABLES;
const VIEW_NAMES: CatalogQuery = super::tree::queries::VIEWS;

/// Character types that take a length.
const SIZED_TYPES: &[&str] = &["VARCHAR2", "CHAR", "NCHAR", "NVARCHAR2"];

/// Types whose defaults and placeholders are written as string literals.
const QUOTED_TYPES: &[&str] = &["CHAR", "VARCHAR2", "NVARCHAR2", "NCHAR", "CLOB"];

/// Length appended to a sized character type declared without one.
const DEFAULT_CHAR_SIZE: u32 = 100;

// =============================================================================
// Reads
// =============================================================================

/// Open and close a session; the error is the connect failure, if any.
pub async fn test_connection<S>(connector: &S, descriptor: &SourceDescriptor) -> DbResult<()>
where
    S: SourceConnector,
{
    let conn = connector.connect(descriptor).await?;
    info!(user = %descriptor.user, host = %descriptor.host, "Connection test succeeded");
    release(conn, Ok(())).await
}

/// Every row of `owner.table`.
pub async fn table_rows<C>(conn: &C, owner: &str, table: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let sql = format!(
        "SELECT * FROM {}.{}",
        quote_source_ident(owner),
        quote_source_ident(table)
    );
    conn.run(&sql, &[]).await
}

/// Column name, nullability, type and default for a table, in any owner.
pub async fn columns<C>(conn: &C, table: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let table = table.to_uppercase();
    fetch(conn, &queries::COLUMNS, &[table.as_str()]).await
}

pub async fn list_tables<C>(conn: &C, owner: &str) -> DbResult<Vec<String>>
where
    C: SourceConnection,
{
    Ok(distinct(fetch(conn, &TABLE_NAMES, &[owner]).await?))
}

pub async fn list_views<C>(conn: &C, owner: &str) -> DbResult<Vec<String>>
where
    C: SourceConnection,
{
    Ok(distinct(fetch(conn, &VIEW_NAMES, &[owner]).await?))
}

/// Source text of a program unit as one cell.
///
/// Lines are concatenated in line order; a spec and its body come out spec
/// first. An unknown name yields a single NULL cell.
pub async fn body<C>(conn: &C, owner: &str, name: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let lines = fetch(conn, &queries::SOURCE_LINES, &[name, owner]).await?;
    let count = lines.rows.len();
    debug!(owner, name, lines = count, "Read program unit source");

    let value = if lines.is_empty() {
        SqlValue::Null
    } else {
        SqlValue::Text(lines.first_column().concat())
    };
    Ok(RowSet::single("TEXT", "CLOB", value))
}

/// Distinct column types in use outside `SYS`/`SYSTEM`.
pub async fn data_types<C>(conn: &C) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    fetch(conn, &queries::DATA_TYPES, &[]).await
}

// =============================================================================
// Drops
// =============================================================================

pub async fn drop_table<C>(conn: &C, owner: &str, name: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let sql = format!(
        "DROP TABLE {}.{} CASCADE CONSTRAINTS",
        quote_source_ident(owner),
        quote_source_ident(name)
    );
    info!(owner, table = name, "Dropping table");
    conn.run(&sql, &[]).await
}

pub async fn drop_view<C>(conn: &C, owner: &str, name: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let sql = format!(
        "DROP VIEW {}.{}",
        quote_source_ident(owner),
        quote_source_ident(name)
    );
    info!(owner, view = name, "Dropping view");
    conn.run(&sql, &[]).await
}

// =============================================================================
// Creates
// =============================================================================

/// A column in the create-table or create-view dialog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
}

impl NewColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            ..Self::default()
        }
    }

    /// Upper-cased type name without any `(size)` suffix.
    fn base_type(&self) -> String {
        let name = self.data_type.split('(').next().unwrap_or_default();
        name.trim().to_uppercase()
    }

    fn has_size(&self) -> bool {
        self.data_type.contains('(')
    }

    fn definition(&self) -> String {
        let base = self.base_type();
        let mut def = format!("{} {}", self.name.trim(), self.data_type.trim());

        if SIZED_TYPES.contains(&base.as_str()) && !self.has_size() {
            def.push_str(&format!("({})", DEFAULT_CHAR_SIZE));
        }

        if let Some(default) = self.default_value.as_deref().filter(|v| !v.is_empty()) {
            def.push_str(" DEFAULT ");
            def.push_str(&format_default(default, &base));
        }

        if self.not_null {
            def.push_str(" NOT NULL");
        }

        if self.primary_key {
            def.push_str(" PRIMARY KEY");
        } else if self.unique {
            def.push_str(" UNIQUE");
        }

        def
    }

    /// Placeholder expression for a view column of this type.
    fn placeholder(&self) -> &'static str {
        let base = self.base_type();
        if base == "DATE" {
            "SYSDATE"
        } else if QUOTED_TYPES.contains(&base.as_str()) {
            "''"
        } else {
            "NULL"
        }
    }
}

/// Quote a default for character and date columns unless it is already a
/// quoted literal or, for dates, a function call like `SYSDATE()`.
fn format_default(value: &str, base_type: &str) -> String {
    let quoted_type = QUOTED_TYPES.contains(&base_type) || base_type == "DATE";
    if !quoted_type {
        return value.to_string();
    }
    if base_type == "DATE" && is_function_call(value) {
        return value.to_string();
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value.to_string();
    }
    format!("'{}'", value)
}

fn is_function_call(value: &str) -> bool {
    value
        .to_uppercase()
        .strip_suffix("()")
        .is_some_and(|name| {
            !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c == '_')
        })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub table_name: String,
    pub columns: Vec<NewColumn>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    pub view_name: String,
    pub columns: Vec<NewColumn>,
}

/// Generated statement, and whether it was sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectScript {
    pub success: bool,
    pub sql: String,
    pub executed: bool,
}

fn require_columns(object: &str, name: &str, columns: &[NewColumn]) -> DbResult<()> {
    if name.trim().is_empty() {
        let message = format!("{} name is required", object);
        return Err(DbError::invalid_input(message));
    }
    if columns.is_empty() {
        return Err(DbError::invalid_input(format!(
            "{} '{}' needs at least one column",
            object, name
        )));
    }
    if let Some(pos) = columns.iter().position(|c| c.name.trim().is_empty()) {
        return Err(DbError::invalid_input(format!(
            "Column {} of '{}' has no name",
            pos + 1,
            name
        )));
    }
    Ok(())
}

pub fn create_table_sql(owner: &str, table: &TableDefinition) -> DbResult<String> {
    require_columns("Table", &table.table_name, &table.columns)?;
    let defs: Vec<String> = table.columns.iter().map(NewColumn::definition).collect();
    Ok(format!(
        "CREATE TABLE {}.{} (\n{}\n)",
        owner.trim(),
        table.table_name.trim(),
        defs.join(",\n")
    ))
}

pub fn create_view_sql(owner: &str, view: &ViewDefinition) -> DbResult<String> {
    require_columns("View", &view.view_name, &view.columns)?;
    let parts: Vec<String> = view
        .columns
        .iter()
        .map(|c| format!("{} AS {}", c.placeholder(), c.name.trim()))
        .collect();
    Ok(format!(
        "CREATE OR REPLACE VIEW {}.{} AS\nSELECT\n  {}\nFROM dual",
        owner.trim(),
        view.view_name.trim(),
        parts.join(",\n  ")
    ))
}

/// Run `sql` unless `preview` is set.
pub async fn apply_script<C>(conn: &C, sql: String, preview: bool) -> DbResult<ObjectScript>
where
    C: SourceConnection,
{
    if !preview {
        conn.run(&sql, &[]).await?;
        info!(sql = %sql, "Created object");
    }
    Ok(ObjectScript {
        success: true,
        sql,
        executed: !preview,
    })
}
