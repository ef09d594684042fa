//! Owner/object tree for the console sidebar.

use crate::db::{CatalogQuery, SourceConnection, fetch};
use crate::error::DbResult;
use crate::models::{OwnerObjects, RowSet};
use std::collections::HashSet;
use tracing::debug;

// =============================================================================
// SQL Query Templates
// =============================================================================

pub(crate) mod queries {
    use crate::db::CatalogQuery;

    pub const OWNERS: CatalogQuery = CatalogQuery::new(
        "SELECT username AS owner FROM dba_users ORDER BY username",
        "SELECT username AS owner FROM all_users ORDER BY username",
    );

    pub const TABLES: CatalogQuery = CatalogQuery::new(
        "SELECT table_name FROM dba_tables WHERE owner = :1",
        "SELECT table_name FROM all_tables WHERE owner = :1",
    );

    pub const VIEWS: CatalogQuery = CatalogQuery::new(
        "SELECT view_name FROM dba_views WHERE owner = :1",
        "SELECT view_name FROM all_views WHERE owner = :1",
    );

    pub const INDEXES: CatalogQuery = CatalogQuery::new(
        "SELECT table_name || '.' || index_name FROM dba_indexes WHERE owner = :1",
        "SELECT table_name || '.' || index_name FROM all_indexes WHERE owner = :1",
    );

    pub const TRIGGERS: CatalogQuery = CatalogQuery::new(
        "SELECT trigger_name FROM dba_triggers WHERE owner = :1",
        "SELECT trigger_name FROM all_triggers WHERE owner = :1",
    );

    pub const PACKAGES: CatalogQuery = CatalogQuery::new(
        "SELECT object_name FROM dba_objects WHERE object_type = 'PACKAGE' AND owner = :1",
        "SELECT object_name FROM all_objects WHERE object_type = 'PACKAGE' AND owner = :1",
    );

    pub const PROCEDURES: CatalogQuery = CatalogQuery::new(
        "SELECT object_name FROM dba_objects WHERE object_type = 'PROCEDURE' AND owner = :1",
        "SELECT object_name FROM all_objects WHERE object_type = 'PROCEDURE' AND owner = :1",
    );

    pub const FUNCTIONS: CatalogQuery = CatalogQuery::new(
        "SELECT object_name FROM dba_objects WHERE object_type = 'FUNCTION' AND owner = :1",
        "SELECT object_name FROM all_objects WHERE object_type = 'FUNCTION' AND owner = :1",
    );

    /// Not owner-scoped; repeated for every owner.
    pub const TABLESPACES: CatalogQuery = CatalogQuery::new(
        "SELECT tablespace_name FROM dba_tablespaces",
        "SELECT tablespace_name FROM user_tablespaces",
    );
}

/// Every visible owner with its object names.
///
/// Owners are walked one at a time; the eight reads for one owner run
/// concurrently. Any unrecoverable read aborts the whole tree.
pub async fn build_tree<C>(conn: &C) -> DbResult<Vec<OwnerObjects>>
where
    C: SourceConnection,
{
    let owners = distinct(fetch(conn, &queries::OWNERS, &[]).await?);
    debug!(owners = owners.len(), "Building schema tree");

    let mut tree = Vec::with_capacity(owners.len());
    for owner in owners {
        tree.push(owner_objects(conn, owner).await?);
    }
    Ok(tree)
}

async fn owner_objects<C>(conn: &C, owner: String) -> DbResult<OwnerObjects>
where
    C: SourceConnection,
{
    let binds = [owner.as_str()];
    let (tables, views, indexes, triggers, packages, procedures, functions, tablespaces) =
        tokio::try_join!(
            fetch(conn, &queries::TABLES, &binds),
            fetch(conn, &queries::VIEWS, &binds),
            fetch(conn, &queries::INDEXES, &binds),
            fetch(conn, &queries::TRIGGERS, &binds),
            fetch(conn, &queries::PACKAGES, &binds),
            fetch(conn, &queries::PROCEDURES, &binds),
            fetch(conn, &queries::FUNCTIONS, &binds),
            fetch(conn, &queries::TABLESPACES, &[]),
        )?;

    Ok(OwnerObjects {
        tables: distinct(tables),
        views: distinct(views),
        indexes: distinct(indexes),
        triggers: distinct(triggers),
        packages: distinct(packages),
        procedures: distinct(procedures),
        functions: distinct(functions),
        tablespaces: distinct(tablespaces),
        ..OwnerObjects::new(owner)
    })
}

/// First-column names, keeping engine order and dropping repeats.
pub(crate) fn distinct(rows: RowSet) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.first_column()
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}
