//! Console operations.
//!
//! Each function takes an already-open connection; opening and releasing it
//! is the transport's job.

pub mod ddl;
pub mod erd;
pub mod migrate;
pub mod objects;
pub mod query;
pub mod tree;

pub use ddl::{DdlKind, DdlText, fetch_ddl};
pub use erd::build_diagram;
pub use migrate::migrate_schema;
pub use objects::{NewColumn, ObjectScript, TableDefinition, ViewDefinition};
pub use query::{run_query, run_script, split_statements};
pub use tree::build_tree;
