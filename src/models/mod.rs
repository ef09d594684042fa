//! Data models for the database console.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod migration;
pub mod query;
pub mod schema;

// Re-export commonly used types
pub use connection::{DEFAULT_TARGET_PORT, SourceDescriptor, TargetDescriptor};
pub use migration::{
    MigrationManifest, MigrationReport, MigrationStatus, ObjectMigration, StatementCounts,
    StatementOutcome,
};
pub use query::{ColumnMetadata, RowSet, SqlValue};
pub use schema::{
    ErdColumn, ErdDiagram, ErdEdge, ErdGraph, ErdNode, ErdNodeData, OwnerObjects, Position,
    Relation,
};
