//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Source engine seam and its Oracle driver
//! - Target engine seam and its PostgreSQL driver
//! - Privileged/restricted catalog fallback
//! - Type mappings and SQL text rendering

pub mod fallback;
pub mod oracle;
pub mod source;
pub mod target;
pub mod types;

pub use fallback::{CatalogQuery, CatalogScope, Scoped, fetch, try_execute};
pub use oracle::{OracleConnection, OracleConnector};
pub use source::{SourceConnection, SourceConnector, ValueStream, release};
pub use target::{
    PostgresConnection, PostgresConnector, TargetConnection, TargetConnector, release_target,
};
pub use types::{SourceColumn, quote_ident, quote_source_ident, sanitize_identifier, sql_literal};
