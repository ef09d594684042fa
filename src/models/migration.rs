//! Migration manifest models.
//!
//! The manifest is built while a schema is copied and returned with the HTTP
//! response; nothing is persisted.

use serde::Serialize;
use std::collections::BTreeMap;

/// Outcome of one statement sent to the target engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementOutcome {
    pub sql: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatementOutcome {
    pub fn succeeded(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(sql: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Everything attempted for one table or view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectMigration {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl: Option<String>,
    /// True when a constant view was created as a table
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub materialized: bool,
    pub inserts: Vec<String>,
    /// Primary and foreign key statements
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    /// Every executed statement in execution order
    pub results: Vec<StatementOutcome>,
    /// Source-side read failure that prevented part of this object's copy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,
}

/// Keyed by `TABLE_<name>` / `VIEW_<name>`.
pub type MigrationManifest = BTreeMap<String, ObjectMigration>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Every statement succeeded
    Complete,
    /// At least one statement or source read failed
    Partial,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementCounts {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationReport {
    pub success: bool,
    pub status: MigrationStatus,
    pub message: String,
    /// Target namespace the objects were created in
    pub schema: String,
    /// Namespace creation and session setup
    pub setup: Vec<StatementOutcome>,
    pub manifest: MigrationManifest,
    pub statements: StatementCounts,
    /// Owner-wide source reads (constraints, views) that failed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_errors: Vec<String>,
}

pub fn table_key(name: &str) -> String {
    format!("TABLE_{}", name)
}

pub fn view_key(name: &str) -> String {
    format!("VIEW_{}", name)
}
