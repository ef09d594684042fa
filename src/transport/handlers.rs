//! Route handlers.
//!
//! Every handler opens its own source connection from the request's
//! descriptor and releases it before responding, on success and on error.
//! Reads take the descriptor from the query string, writes from the JSON
//! body.

use crate::db::{SourceConnector, TargetConnector, release, release_target};
use crate::error::{DbError, DbResult};
use crate::models::{
    ErdDiagram, MigrationReport, OwnerObjects, RowSet, SourceDescriptor, TargetDescriptor,
};
use crate::services::{
    self, DdlKind, DdlText, ObjectScript, TableDefinition, ViewDefinition, erd, objects,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

/// Shared handler state: the two engine connectors.
pub struct AppState<S, T> {
    pub source: Arc<S>,
    pub target: Arc<T>,
}

impl<S, T> AppState<S, T> {
    pub fn new(source: S, target: T) -> Self {
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
        }
    }
}

impl<S, T> Clone for AppState<S, T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
        }
    }
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(flatten)]
    pub connection: SourceDescriptor,
    pub query: String,
    /// Split on `;` and return the last statement's result
    #[serde(default)]
    pub multiple: bool,
}

#[derive(Debug, Deserialize)]
pub struct ErdRequest {
    #[serde(flatten)]
    pub connection: SourceDescriptor,
    pub owner: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    #[serde(flatten)]
    pub connection: SourceDescriptor,
    #[serde(flatten)]
    pub table: TableDefinition,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateViewRequest {
    #[serde(flatten)]
    pub connection: SourceDescriptor,
    #[serde(flatten)]
    pub view: ViewDefinition,
    #[serde(default)]
    pub preview: bool,
}

#[derive(Debug, Deserialize)]
pub struct MigrationRequest {
    #[serde(flatten)]
    pub source: SourceDescriptor,
    #[serde(flatten)]
    pub target: TargetDescriptor,
}

// =============================================================================
// Handlers
// =============================================================================

pub async fn tree<S, T>(
    State(state): State<AppState<S, T>>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<Vec<OwnerObjects>>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = services::build_tree(&conn).await;
    let tree = release(conn, result).await?;
    info!(owners = tree.len(), "Served schema tree");
    Ok(Json(tree))
}

pub async fn test_connection<S, T>(
    State(state): State<AppState<S, T>>,
    Json(descriptor): Json<SourceDescriptor>,
) -> Response
where
    S: SourceConnector,
{
    let source = state.source.as_ref();
    match objects::test_connection(source, &descriptor).await {
        Ok(()) => Json(serde_json::json!({ "success": true })).into_response(),
        Err(e) => {
            error!(error = %e, host = %descriptor.host, "Connection test failed");
            let body = serde_json::json!({ "success": false, "message": e.detail() });
            (e.status_code(), Json(body)).into_response()
        }
    }
}

pub async fn table_rows<S, T>(
    State(state): State<AppState<S, T>>,
    Path((owner, name)): Path<(String, String)>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::table_rows(&conn, &owner, &name).await;
    let rows = release(conn, result).await?;
    info!(owner = %owner, table = %name, rows = rows.rows.len(), "Served table rows");
    Ok(Json(rows))
}

pub async fn columns<S, T>(
    State(state): State<AppState<S, T>>,
    Path(table): Path<String>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::columns(&conn, &table).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn list_tables<S, T>(
    State(state): State<AppState<S, T>>,
    Path(owner): Path<String>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<Vec<String>>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::list_tables(&conn, &owner).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn list_views<S, T>(
    State(state): State<AppState<S, T>>,
    Path(owner): Path<String>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<Vec<String>>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::list_views(&conn, &owner).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn body<S, T>(
    State(state): State<AppState<S, T>>,
    Path((owner, name)): Path<(String, String)>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::body(&conn, &owner, &name).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn run_query<S, T>(
    State(state): State<AppState<S, T>>,
    Json(request): Json<QueryRequest>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&request.connection).await?;
    let result = if request.multiple {
        services::run_script(&conn, &request.query).await
    } else {
        services::run_query(&conn, &request.query).await
    };
    Ok(Json(release(conn, result).await?))
}

pub async fn data_types<S, T>(
    State(state): State<AppState<S, T>>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::data_types(&conn).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn drop_table<S, T>(
    State(state): State<AppState<S, T>>,
    Path((owner, name)): Path<(String, String)>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::drop_table(&conn, &owner, &name).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn drop_view<S, T>(
    State(state): State<AppState<S, T>>,
    Path((owner, name)): Path<(String, String)>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<RowSet>>
where
    S: SourceConnector,
{
    let conn = state.source.connect(&descriptor).await?;
    let result = objects::drop_view(&conn, &owner, &name).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn create_table<S, T>(
    State(state): State<AppState<S, T>>,
    Path(owner): Path<String>,
    Json(request): Json<CreateTableRequest>,
) -> DbResult<Json<ObjectScript>>
where
    S: SourceConnector,
{
    let sql = objects::create_table_sql(&owner, &request.table)?;
    let conn = state.source.connect(&request.connection).await?;
    let result = objects::apply_script(&conn, sql, request.preview).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn create_view<S, T>(
    State(state): State<AppState<S, T>>,
    Path(owner): Path<String>,
    Json(request): Json<CreateViewRequest>,
) -> DbResult<Json<ObjectScript>>
where
    S: SourceConnector,
{
    let sql = objects::create_view_sql(&owner, &request.view)?;
    let conn = state.source.connect(&request.connection).await?;
    let result = objects::apply_script(&conn, sql, request.preview).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn erd<S, T>(
    State(state): State<AppState<S, T>>,
    Json(request): Json<ErdRequest>,
) -> Response
where
    S: SourceConnector,
{
    match diagram(state.source.as_ref(), &request).await {
        Ok(diagram) => Json(diagram).into_response(),
        Err(e) => {
            error!(error = %e, owner = %request.owner, "ERD build failed");
            let body = serde_json::json!({ "success": false, "error": e.detail() });
            (e.status_code(), Json(body)).into_response()
        }
    }
}

async fn diagram<S>(source: &S, request: &ErdRequest) -> DbResult<ErdDiagram>
where
    S: SourceConnector,
{
    if request.owner.trim().is_empty() {
        return Err(DbError::invalid_input("owner is required"));
    }
    let conn = source.connect(&request.connection).await?;
    let result = erd::build_diagram(&conn, &request.owner).await;
    release(conn, result).await
}

pub async fn ddl<S, T>(
    State(state): State<AppState<S, T>>,
    Path((owner, name, kind)): Path<(String, String, String)>,
    Query(descriptor): Query<SourceDescriptor>,
) -> DbResult<Json<DdlText>>
where
    S: SourceConnector,
{
    // Unknown kinds are rejected before any connection is opened.
    let kind: DdlKind = kind.parse()?;
    let conn = state.source.connect(&descriptor).await?;
    let result = services::fetch_ddl(&conn, &owner, &name, kind).await;
    Ok(Json(release(conn, result).await?))
}

pub async fn migrate<S, T>(
    State(state): State<AppState<S, T>>,
    Path(owner): Path<String>,
    Json(request): Json<MigrationRequest>,
) -> DbResult<Json<MigrationReport>>
where
    S: SourceConnector,
    T: TargetConnector,
{
    request.target.validate()?;
    let source = state.source.connect(&request.source).await?;
    let mut target = match state.target.connect(&request.target).await {
        Ok(target) => target,
        Err(e) => return release(source, Err(e)).await,
    };

    let result = services::migrate_schema(&source, &mut target, &owner).await;
    let result = release_target(target, result).await;
    Ok(Json(release(source, result).await?))
}
