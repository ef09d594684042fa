//! End-to-end tests of the HTTP routes over scripted engines.
//!
//! Every request is driven through the router with `oneshot`; the fakes
//! record which statements ran and how many connections were opened and
//! closed.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{DESCRIPTOR_QUERY, FakeSource, FakeTarget, Reply, names, rows, text_row};
use db_console::transport::{AppState, build_router, cors_layer};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(source: &FakeSource, target: &FakeTarget) -> Router {
    app_at(source, target, "/api")
}

fn app_at(source: &FakeSource, target: &FakeTarget, prefix: &str) -> Router {
    let state = AppState::new(source.clone(), target.clone());
    build_router(state, prefix, cors_layer(&[]).unwrap())
}

/// `path` with the source descriptor as query parameters.
fn described(path: &str) -> String {
    format!("{}?{}", path, DESCRIPTOR_QUERY)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Request body fields naming the source connection.
fn connection() -> Value {
    json!({ "user": "hr", "password": "secret", "host": "db.local", "service": "XE" })
}

fn with_connection(extra: Value) -> Value {
    let mut body = connection();
    if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
        body.extend(extra.clone());
    }
    body
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn assert_released(source: &FakeSource) {
    assert_eq!(
        source.connects(),
        source.closes(),
        "every connection is closed"
    );
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn test_tree_route() {
    let source = FakeSource::new()
        .on("FROM dba_users", Reply::Rows(names("OWNER", &["HR"])))
        .on(
            "FROM dba_tables",
            Reply::Rows(names("TABLE_NAME", &["EMP"])),
        );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/tree"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["owner"], "HR");
    assert_eq!(body[0]["tables"], json!(["EMP"]));
    assert_eq!(source.connects(), 1);
    assert_released(&source);
}

#[tokio::test]
async fn test_failed_read_closes_connection_and_reports_error() {
    let source = FakeSource::new().on(
        "FROM dba_users",
        Reply::fail("ORA-01031", "insufficient privileges"),
    );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/tree"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "insufficient privileges");
    assert_eq!(body["code"], "ORA-01031");
    assert_eq!(source.closes(), 1);
}

#[tokio::test]
async fn test_missing_descriptor_is_rejected_before_connecting() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let (status, _) = send(app(&source, &target), get("/api/tree?user=hr")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(source.connects(), 0);
}

#[tokio::test]
async fn test_table_rows_and_drop_share_a_path() {
    let source = FakeSource::new().on(
        "SELECT * FROM \"HR\".\"EMP\"",
        Reply::Rows(rows(&["ENAME"], vec![text_row(&["KING"])])),
    );
    let target = FakeTarget::new();
    let uri = described("/api/table/HR/EMP");

    let (status, body) = send(app(&source, &target), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metaData"][0]["name"], "ENAME");
    assert_eq!(body["rows"], json!([["KING"]]));

    let (status, body) = send(app(&source, &target), delete(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rowsAffected"], 0);
    assert_eq!(
        source.ran("DROP TABLE \"HR\".\"EMP\" CASCADE CONSTRAINTS"),
        1
    );
    assert_released(&source);
}

#[tokio::test]
async fn test_columns_route_uppercases_table() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, _) = send(router, get(&described("/api/emp/columns"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.calls()[0].binds, vec!["EMP"]);
}

#[tokio::test]
async fn test_body_route_joins_source_lines() {
    let source = FakeSource::new().on(
        "FROM dba_source",
        Reply::Rows(names("TEXT", &["PACKAGE payroll AS\n", "END;\n"])),
    );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/body/HR/PAYROLL"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"][0][0], "PACKAGE payroll AS\nEND;\n");
    assert_eq!(source.calls()[0].binds, vec!["PAYROLL", "HR"]);
}

#[tokio::test]
async fn test_list_routes() {
    let source = FakeSource::new()
        .on(
            "FROM dba_tables",
            Reply::Rows(names("TABLE_NAME", &["EMP", "DEPT"])),
        )
        .on("FROM dba_views", Reply::denied())
        .on(
            "FROM all_views",
            Reply::Rows(names("VIEW_NAME", &["EMP_V"])),
        );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (_, tables) = send(router, get(&described("/api/tables/HR"))).await;
    let router = app(&source, &target);
    let (_, views) = send(router, get(&described("/api/views/HR"))).await;

    assert_eq!(tables, json!(["EMP", "DEPT"]));
    assert_eq!(views, json!(["EMP_V"]));
    assert_released(&source);
}

#[tokio::test]
async fn test_data_types_route_falls_back() {
    let source = FakeSource::new()
        .on("FROM dba_tab_columns", Reply::denied())
        .on(
            "FROM all_tab_columns",
            Reply::Rows(names("TYPE_NAME", &["DATE", "NUMBER", "VARCHAR2"])),
        );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/data-types"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"], json!([["DATE"], ["NUMBER"], ["VARCHAR2"]]));
    assert_eq!(source.calls().len(), 2);
    assert_released(&source);
}

// =============================================================================
// DDL
// =============================================================================

#[tokio::test]
async fn test_ddl_route() {
    let source = FakeSource::new().on(
        "DBMS_METADATA.GET_DDL",
        Reply::chunks(&["CREATE VIEW ", "EMP_V AS ..."]),
    );
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/ddl/HR/EMP_V/view"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "ddl": "CREATE VIEW EMP_V AS ...", "owner": "HR", "name": "EMP_V", "type": "VIEW" })
    );
    assert_released(&source);
}

#[tokio::test]
async fn test_ddl_unsupported_kind_never_connects() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, body) = send(router, get(&described("/api/ddl/HR/EMP/synonym"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("synonym"));
    assert_eq!(source.connects(), 0);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_connection_test_route() {
    let target = FakeTarget::new();

    let ok = FakeSource::new();
    let request = post("/api/test", connection());
    let (status, body) = send(app(&ok, &target), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));
    assert_released(&ok);

    let down = FakeSource::new().refusing();
    let request = post("/api/test", connection());
    let (status, body) = send(app(&down, &target), request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "ORA-12541: TNS:no listener");
}

#[tokio::test]
async fn test_query_route_multiple() {
    let source = FakeSource::new()
        .on("SELECT 1", Reply::Rows(names("A", &["one"])))
        .on("SELECT 2", Reply::Rows(names("B", &["two"])));
    let target = FakeTarget::new();
    let script = json!({ "query": "SELECT 1 FROM DUAL; SELECT 2 FROM DUAL", "multiple": true });
    let request = post("/api/query", with_connection(script));

    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metaData"][0]["name"], "B");
    assert_eq!(body["rows"], json!([["two"]]));
    assert_released(&source);
}

#[tokio::test]
async fn test_create_table_preview_does_not_execute() {
    let source = FakeSource::new();
    let target = FakeTarget::new();
    let table = json!({
        "tableName": "AUDIT_LOG",
        "columns": [
            { "name": "ID", "type": "NUMBER", "primaryKey": true },
            { "name": "MSG", "type": "VARCHAR2", "notNull": true }
        ],
        "preview": true
    });

    let request = post("/api/table/HR", with_connection(table));
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executed"], false);
    assert_eq!(
        body["sql"],
        "CREATE TABLE HR.AUDIT_LOG (\nID NUMBER PRIMARY KEY,\nMSG VARCHAR2(100) NOT NULL\n)"
    );
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn test_create_view_executes() {
    let source = FakeSource::new();
    let target = FakeTarget::new();
    let view = json!({
        "viewName": "V_NOW",
        "columns": [{ "name": "AT", "type": "DATE" }]
    });

    let request = post("/api/view/HR", with_connection(view));
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["executed"], true);
    assert_eq!(source.ran("CREATE OR REPLACE VIEW HR.V_NOW AS"), 1);
    assert_released(&source);
}

#[tokio::test]
async fn test_create_table_without_columns_is_bad_request() {
    let source = FakeSource::new();
    let target = FakeTarget::new();
    let table = json!({ "tableName": "EMPTY", "columns": [] });

    let request = post("/api/table/HR", with_connection(table));
    let (status, _) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(source.connects(), 0);
}

#[tokio::test]
async fn test_drop_view_route() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let router = app(&source, &target);
    let (status, _) = send(router, delete(&described("/api/view/HR/EMP_V"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(source.ran("DROP VIEW \"HR\".\"EMP_V\""), 1);
}

// =============================================================================
// ERD
// =============================================================================

#[tokio::test]
async fn test_erd_route() {
    let source = FakeSource::new().on(
        "SELECT table_name FROM all_tables",
        Reply::Rows(names("TABLE_NAME", &["DEPT"])),
    );
    let target = FakeTarget::new();

    let request = post("/api/erd", with_connection(json!({ "owner": "hr" })));
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["tables"], json!(["DEPT"]));
    assert_eq!(body["graph"]["nodes"][0]["id"], "DEPT");
    assert_released(&source);
}

#[tokio::test]
async fn test_erd_failure_shape() {
    let source = FakeSource::new().on(
        "FROM all_tables",
        Reply::fail("ORA-00942", "table or view does not exist"),
    );
    let target = FakeTarget::new();

    let request = post("/api/erd", with_connection(json!({ "owner": "HR" })));
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "success": false, "error": "table or view does not exist" })
    );
    assert_released(&source);
}

#[tokio::test]
async fn test_erd_blank_owner_is_bad_request() {
    let source = FakeSource::new();
    let target = FakeTarget::new();
    let request = post("/api/erd", with_connection(json!({ "owner": "  " })));

    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "success": false, "error": "owner is required" })
    );
    assert_eq!(source.connects(), 0);
}

// =============================================================================
// Migration
// =============================================================================

fn migration_body() -> Value {
    with_connection(json!({
        "pgUser": "postgres",
        "pgPassword": "pw",
        "pgHost": "localhost",
        "pgPort": "5432",
        "pgDatabase": "copy"
    }))
}

#[tokio::test]
async fn test_migration_route_closes_both_connections() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let request = post("/api/migration/HR", migration_body());
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "complete");
    assert!(body["message"].as_str().unwrap().contains("\"hr\""));
    assert_eq!(target.connects(), 1);
    assert_eq!(target.closes(), 1);
    assert_released(&source);
}

#[tokio::test]
async fn test_migration_target_refusal_releases_source() {
    let source = FakeSource::new();
    let target = FakeTarget::new().refusing();

    let request = post("/api/migration/HR", migration_body());
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["suggestion"], "Check pgUser and pgPassword");
    assert_eq!(source.connects(), 1);
    assert_released(&source);
}

#[tokio::test]
async fn test_migration_blank_target_field_is_bad_request() {
    let source = FakeSource::new();
    let target = FakeTarget::new();
    let mut body = migration_body();
    body["pgHost"] = json!(" ");

    let request = post("/api/migration/HR", body);
    let (status, body) = send(app(&source, &target), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("pgHost"));
    assert_eq!(source.connects(), 0);
    assert_eq!(target.connects(), 0);
}

// =============================================================================
// Prefix
// =============================================================================

#[tokio::test]
async fn test_root_prefix_serves_without_api_segment() {
    let source = FakeSource::new();
    let target = FakeTarget::new();

    let router = app_at(&source, &target, "/");
    let (status, _) = send(router, get(&described("/tables/HR"))).await;
    assert_eq!(status, StatusCode::OK);

    let router = app(&source, &target);
    let (status, _) = send(router, get(&described("/tables/HR"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
