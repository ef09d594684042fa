//! Copy one source owner into a PostgreSQL schema.
//!
//! Order: namespace, every table's DDL, every table's rows, primary keys,
//! foreign keys, then views. Each generated statement runs on its own and a
//! failure is recorded and skipped; nothing is rolled back. The returned
//! [`MigrationReport`] lists every statement with its outcome.

use crate::db::{
    SourceColumn, SourceConnection, TargetConnection, fetch, quote_ident, quote_source_ident,
    sql_literal,
};
use crate::error::DbResult;
use crate::models::migration::{table_key, view_key};
use crate::models::{
    MigrationManifest, MigrationReport, MigrationStatus, RowSet, SqlValue, StatementCounts,
    StatementOutcome,
};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

// =============================================================================
// SQL Query Templates
// =============================================================================

mod queries {
    use crate::db::CatalogQuery;

    pub const TABLES: CatalogQuery = CatalogQuery::new(
        "SELECT table_name FROM dba_tables WHERE owner = :1 ORDER BY table_name",
        "SELECT table_name FROM all_tables WHERE owner = :1 ORDER BY table_name",
    );

    pub const COLUMNS: CatalogQuery = CatalogQuery::new(
        r#"
        SELECT column_name, data_type, data_length, char_length,
               data_precision, data_scale, nullable
        FROM dba_tab_columns
        WHERE owner = :1 AND table_name = :2
        ORDER BY column_id
        "#,
        r#"
        SELECT column_name, data_type, data_length, char_length,
               data_precision, data_scale, nullable
        FROM all_tab_columns
        WHERE owner = :1 AND table_name = :2
        ORDER BY column_id
        "#,
    );

    pub const PRIMARY_KEYS: CatalogQuery = CatalogQuery::new(
        r#"
        SELECT c.table_name, c.constraint_name, cc.column_name
        FROM dba_constraints c
        JOIN dba_cons_columns cc
          ON cc.owner = c.owner AND cc.constraint_name = c.constraint_name
        WHERE c.constraint_type = 'P' AND c.owner = :1
        ORDER BY c.table_name, c.constraint_name, cc.position
        "#,
        r#"
        SELECT c.table_name, c.constraint_name, cc.column_name
        FROM all_constraints c
        JOIN all_cons_columns cc
          ON cc.owner = c.owner AND cc.constraint_name = c.constraint_name
        WHERE c.constraint_type = 'P' AND c.owner = :1
        ORDER BY c.table_name, c.constraint_name, cc.position
        "#,
    );

    /// Same-owner foreign keys only; referenced tables in other owners are
    /// not copied.
    pub const FOREIGN_KEYS: CatalogQuery = CatalogQuery::new(
        r#"
        SELECT c.table_name, c.constraint_name, a.column_name,
               b.table_name, b.column_name
        FROM dba_constraints c
        JOIN dba_cons_columns a
          ON a.owner = c.owner AND a.constraint_name = c.constraint_name
        JOIN dba_cons_columns b
          ON b.owner = c.r_owner AND b.constraint_name = c.r_constraint_name
         AND b.position = a.position
        WHERE c.constraint_type = 'R' AND c.owner = :1 AND c.r_owner = c.owner
        ORDER BY c.table_name, c.constraint_name, a.position
        "#,
        r#"
        SELECT c.table_name, c.constraint_name, a.column_name,
               b.table_name, b.column_name
        FROM all_constraints c
        JOIN all_cons_columns a
          ON a.owner = c.owner AND a.constraint_name = c.constraint_name
        JOIN all_cons_columns b
          ON b.owner = c.r_owner AND b.constraint_name = c.r_constraint_name
         AND b.position = a.position
        WHERE c.constraint_type = 'R' AND c.owner = :1 AND c.r_owner = c.owner
        ORDER BY c.table_name, c.constraint_name, a.position
        "#,
    );

    pub const VIEWS: CatalogQuery = CatalogQuery::new(
        "SELECT view_name, text FROM dba_views WHERE owner = :1 ORDER BY view_name",
        "SELECT view_name, text FROM all_views WHERE owner = :1 ORDER BY view_name",
    );
}

// =============================================================================
// View translation
// =============================================================================

static FROM_DUAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+FROM\s+DUAL\b").expect("valid regex"));

static READ_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+WITH\s+READ\s+ONLY\b").expect("valid regex"));

static CHECK_OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+WITH\s+CHECK\s+OPTION(\s+CONSTRAINT\s+\S+)?").expect("valid regex")
});

static SYS_CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bSYS(DATE|TIMESTAMP)\b").expect("valid regex"));

static FROM_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFROM\b").expect("valid regex"));

static SELECT_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^SELECT\b").expect("valid regex"));

/// A source view body rewritten for the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedView {
    pub select: String,
    /// The body selects only constants and is created as a table.
    pub constant: bool,
}

/// Strip source-only clauses from a view body and detect constant selects.
pub fn translate_view(text: &str) -> TranslatedView {
    let stripped = FROM_DUAL.replace_all(text, "");
    let stripped = READ_ONLY.replace_all(&stripped, "");
    let stripped = CHECK_OPTION.replace_all(&stripped, "");
    let select = SYS_CLOCK.replace_all(&stripped, "CURRENT_TIMESTAMP");
    let select = select.trim().trim_end_matches(';').trim_end().to_string();

    let constant = SELECT_HEAD.is_match(&select) && !FROM_CLAUSE.is_match(&select);
    TranslatedView { select, constant }
}

// =============================================================================
// Statement builders
// =============================================================================

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn ident_list(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table_sql(schema: &str, table: &str, columns: &[SourceColumn]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .map(|c| format!("  {}", c.target_definition()))
        .collect();
    format!(
        "CREATE TABLE {} (\n{}\n)",
        qualified(schema, table),
        defs.join(",\n")
    )
}

pub fn insert_sql(schema: &str, table: &str, columns: &[String], row: &[SqlValue]) -> String {
    let values: Vec<String> = row.iter().map(sql_literal).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        qualified(schema, table),
        ident_list(columns),
        values.join(", ")
    )
}

pub fn primary_key_sql(schema: &str, key: &PrimaryKey) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
        qualified(schema, &key.table),
        quote_ident(&key.name),
        ident_list(&key.columns)
    )
}

pub fn foreign_key_sql(schema: &str, key: &ForeignKey) -> String {
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        qualified(schema, &key.table),
        quote_ident(&key.name),
        ident_list(&key.columns),
        qualified(schema, &key.parent),
        ident_list(&key.parent_columns)
    )
}

pub fn view_sql(schema: &str, name: &str, view: &TranslatedView) -> String {
    let kind = if view.constant { "TABLE" } else { "VIEW" };
    let target = qualified(schema, name);
    format!("CREATE {} {} AS {}", kind, target, view.select)
}

// =============================================================================
// Catalog records
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub parent: String,
    pub parent_columns: Vec<String>,
}

fn text(row: &[SqlValue], index: usize) -> String {
    row.get(index)
        .and_then(SqlValue::as_str)
        .unwrap_or_default()
        .to_string()
}

fn source_columns(rows: &RowSet) -> Vec<SourceColumn> {
    rows.rows
        .iter()
        .map(|row| SourceColumn {
            name: text(row, 0),
            data_type: text(row, 1),
            data_length: row.get(2).and_then(SqlValue::as_u32),
            char_length: row.get(3).and_then(SqlValue::as_u32),
            precision: row.get(4).and_then(SqlValue::as_u32),
            scale: row.get(5).and_then(SqlValue::as_i32),
            nullable: text(row, 6) != "N",
        })
        .collect()
}

/// Fold per-column constraint rows into one key each, keeping row order.
fn primary_keys(rows: &RowSet) -> Vec<PrimaryKey> {
    let mut keys: Vec<PrimaryKey> = Vec::new();
    for row in &rows.rows {
        let (table, name, column) = (text(row, 0), text(row, 1), text(row, 2));
        match keys.last_mut() {
            Some(key) if key.table == table && key.name == name => key.columns.push(column),
            _ => keys.push(PrimaryKey {
                table,
                name,
                columns: vec![column],
            }),
        }
    }
    keys
}

fn foreign_keys(rows: &RowSet) -> Vec<ForeignKey> {
    let mut keys: Vec<ForeignKey> = Vec::new();
    for row in &rows.rows {
        let (table, name) = (text(row, 0), text(row, 1));
        let (column, parent, parent_column) = (text(row, 2), text(row, 3), text(row, 4));
        match keys.last_mut() {
            Some(key) if key.table == table && key.name == name => {
                key.columns.push(column);
                key.parent_columns.push(parent_column);
            }
            _ => keys.push(ForeignKey {
                table,
                name,
                columns: vec![column],
                parent,
                parent_columns: vec![parent_column],
            }),
        }
    }
    keys
}

// =============================================================================
// Migration
// =============================================================================

async fn exec<T>(target: &mut T, sql: String) -> StatementOutcome
where
    T: TargetConnection,
{
    match target.execute(&sql).await {
        Ok(_) => {
            debug!(sql = %sql, "Target statement succeeded");
            StatementOutcome::succeeded(sql)
        }
        Err(e) => {
            warn!(error = %e, sql = %sql, "Skipping failed target statement");
            StatementOutcome::failed(sql, e.detail())
        }
    }
}

/// Copy `owner` from `source` into the schema of the same (lower-cased)
/// name on `target`.
///
/// Only the initial table listing is fatal; every later failure is recorded
/// in the report.
pub async fn migrate_schema<C, T>(
    source: &C,
    target: &mut T,
    owner: &str,
) -> DbResult<MigrationReport>
where
    C: SourceConnection,
    T: TargetConnection,
{
    let owner = owner.trim().to_uppercase();
    let schema = owner.to_lowercase();
    info!(owner = %owner, schema = %schema, "Starting schema migration");

    let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(&schema));
    let search_path = format!("SET search_path TO {}, public", quote_ident(&schema));
    let setup = vec![
        exec(target, create_schema).await,
        exec(target, search_path).await,
    ];

    let by_owner = [owner.as_str()];
    let tables = super::tree::distinct(fetch(source, &queries::TABLES, &by_owner).await?);
    let mut manifest = MigrationManifest::new();
    let mut source_errors = Vec::new();

    // Tables
    for table in &tables {
        let entry = manifest.entry(table_key(table)).or_default();
        let binds = [owner.as_str(), table.as_str()];
        match fetch(source, &queries::COLUMNS, &binds).await {
            Ok(rows) => {
                let ddl = create_table_sql(&schema, table, &source_columns(&rows));
                entry.ddl = Some(ddl.clone());
                entry.results.push(exec(target, ddl).await);
            }
            Err(e) => {
                warn!(table = %table, error = %e, "Could not read columns");
                entry.source_error = Some(e.detail().to_string());
            }
        }
    }

    // Rows
    for table in &tables {
        let entry = manifest.entry(table_key(table)).or_default();
        if entry.source_error.is_some() {
            continue;
        }
        let select = format!(
            "SELECT * FROM {}.{}",
            quote_source_ident(&owner),
            quote_source_ident(table)
        );
        let rows = match source.run(&select, &[]).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %table, error = %e, "Could not read rows");
                entry.source_error = Some(e.detail().to_string());
                continue;
            }
        };
        let columns: Vec<String> = rows.meta_data.iter().map(|c| c.name.clone()).collect();
        debug!(table = %table, rows = rows.rows.len(), "Copying rows");
        for row in &rows.rows {
            let insert = insert_sql(&schema, table, &columns, row);
            entry.inserts.push(insert.clone());
            entry.results.push(exec(target, insert).await);
        }
    }

    // Constraints
    match fetch(source, &queries::PRIMARY_KEYS, &by_owner).await {
        Ok(rows) => {
            for key in primary_keys(&rows) {
                let sql = primary_key_sql(&schema, &key);
                let entry = manifest.entry(table_key(&key.table)).or_default();
                entry.constraints.push(sql.clone());
                entry.results.push(exec(target, sql).await);
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not read primary keys");
            source_errors.push(format!("primary keys: {}", e.detail()));
        }
    }

    match fetch(source, &queries::FOREIGN_KEYS, &by_owner).await {
        Ok(rows) => {
            for key in foreign_keys(&rows) {
                let sql = foreign_key_sql(&schema, &key);
                let entry = manifest.entry(table_key(&key.table)).or_default();
                entry.constraints.push(sql.clone());
                entry.results.push(exec(target, sql).await);
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not read foreign keys");
            source_errors.push(format!("foreign keys: {}", e.detail()));
        }
    }

    // Views
    match fetch(source, &queries::VIEWS, &by_owner).await {
        Ok(rows) => {
            for row in &rows.rows {
                let name = text(row, 0);
                let view = translate_view(&text(row, 1));
                let sql = view_sql(&schema, &name, &view);
                let outcome = exec(target, sql.clone()).await;
                let entry = manifest.entry(view_key(&name)).or_default();
                entry.ddl = Some(sql);
                entry.materialized = view.constant;
                entry.results.push(outcome);
            }
        }
        Err(e) => {
            warn!(error = %e, "Could not read views");
            source_errors.push(format!("views: {}", e.detail()));
        }
    }

    let report = summarize(owner, schema, setup, manifest, source_errors);
    info!(
        schema = %report.schema,
        attempted = report.statements.attempted,
        failed = report.statements.failed,
        status = ?report.status,
        "Schema migration finished"
    );
    Ok(report)
}

fn summarize(
    owner: String,
    schema: String,
    setup: Vec<StatementOutcome>,
    manifest: MigrationManifest,
    source_errors: Vec<String>,
) -> MigrationReport {
    let outcomes = setup
        .iter()
        .chain(manifest.values().flat_map(|m| m.results.iter()));
    let mut counts = StatementCounts::default();
    for outcome in outcomes {
        counts.attempted += 1;
        if outcome.ok {
            counts.succeeded += 1;
        } else {
            counts.failed += 1;
        }
    }

    let unread = manifest
        .values()
        .filter(|m| m.source_error.is_some())
        .count()
        + source_errors.len();

    let (status, message) = if counts.failed == 0 && unread == 0 {
        (
            MigrationStatus::Complete,
            format!(
                "Schema {} migrated to PostgreSQL schema \"{}\" ({} statements)",
                owner, schema, counts.attempted
            ),
        )
    } else {
        (
            MigrationStatus::Partial,
            format!(
                "Schema {} partially migrated to \"{}\": {} of {} statements failed, {} source reads failed",
                owner, schema, counts.failed, counts.attempted, unread
            ),
        )
    };

    MigrationReport {
        success: true,
        status,
        message,
        schema,
        setup,
        manifest,
        statements: counts,
        source_errors,
    }
}
