//! Ad-hoc SQL from the console editor.
//!
//! Text is executed verbatim; the caller is trusted.

use crate::db::SourceConnection;
use crate::error::{DbError, DbResult};
use crate::models::RowSet;
use tracing::{debug, info};

/// Execute one statement, auto-committing.
pub async fn run_query<C>(conn: &C, sql: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input("Query text is empty"));
    }
    let result = conn.run(sql, &[]).await?;
    info!(rows = result.rows.len(), "Query executed");
    Ok(result)
}

/// Execute `;`-separated statements in order and return the last result.
///
/// The first failure stops the script; later statements are not attempted.
pub async fn run_script<C>(conn: &C, script: &str) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    let statements = split_statements(script);
    if statements.is_empty() {
        return Err(DbError::invalid_input("Query text is empty"));
    }

    let total = statements.len();
    let mut last = RowSet::default();
    for (i, statement) in statements.into_iter().enumerate() {
        debug!(index = i + 1, total, "Running script statement");
        last = conn.run(statement, &[]).await?;
    }
    info!(
        statements = total,
        rows = last.rows.len(),
        "Script executed"
    );
    Ok(last)
}

/// Split on `;`, trimming and skipping empty fragments.
///
/// Semicolons inside literals or PL/SQL blocks are not recognized.
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
