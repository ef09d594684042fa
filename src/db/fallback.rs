//! Privileged-then-restricted catalog reads.
//!
//! Most catalog facts are exposed twice: an administrator-scope view
//! (`DBA_*`) and a self-scope view (`ALL_*`/`USER_*`). Which one the current
//! credential may read is only known by trying.

use crate::db::source::SourceConnection;
use crate::error::DbResult;
use crate::models::RowSet;
use tracing::debug;

/// A catalog query available in two access scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogQuery {
    pub privileged: &'static str,
    pub restricted: &'static str,
}

impl CatalogQuery {
    pub const fn new(privileged: &'static str, restricted: &'static str) -> Self {
        Self {
            privileged,
            restricted,
        }
    }
}

/// Which text of a [`CatalogQuery`] produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogScope {
    Privileged,
    Restricted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scoped<T> {
    pub scope: CatalogScope,
    pub value: T,
}

impl<T> Scoped<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Run the privileged text; on an insufficient-privileges error run the
/// restricted text once with the same binds.
///
/// Any other error propagates unchanged, as does a second denial.
pub async fn try_execute<C>(
    conn: &C,
    query: &CatalogQuery,
    binds: &[&str],
) -> DbResult<Scoped<RowSet>>
where
    C: SourceConnection,
{
    match conn.run(query.privileged, binds).await {
        Ok(rows) => Ok(Scoped {
            scope: CatalogScope::Privileged,
            value: rows,
        }),
        Err(e) if e.is_insufficient_privileges() => {
            debug!(error = %e, "Privileged catalog view denied, using restricted view");
            let rows = conn.run(query.restricted, binds).await?;
            Ok(Scoped {
                scope: CatalogScope::Restricted,
                value: rows,
            })
        }
        Err(e) => Err(e),
    }
}

/// [`try_execute`] for callers that only need the rows.
pub async fn fetch<C>(conn: &C, query: &CatalogQuery, binds: &[&str]) -> DbResult<RowSet>
where
    C: SourceConnection,
{
    try_execute(conn, query, binds).await.map(Scoped::into_inner)
}
