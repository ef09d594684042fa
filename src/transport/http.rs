//! HTTP transport for the console API.
//!
//! Serves the JSON routes under a configurable prefix with CORS and request
//! tracing, and shuts down gracefully on SIGINT/SIGTERM.

use crate::db::{SourceConnector, TargetConnector};
use crate::error::{DbError, DbResult};
use crate::transport::Transport;
use crate::transport::handlers::{self, AppState};
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Time allowed for in-flight requests (a long migration, say) after the
/// first shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the API router with `state` applied.
///
/// Routes are nested under `prefix`; an empty prefix or `/` serves them at
/// the root.
pub fn build_router<S, T>(state: AppState<S, T>, prefix: &str, cors: CorsLayer) -> Router
where
    S: SourceConnector,
    T: TargetConnector,
{
    let api = Router::new()
        .route("/tree", get(handlers::tree::<S, T>))
        .route("/test", post(handlers::test_connection::<S, T>))
        .route(
            "/table/{owner}/{name}",
            get(handlers::table_rows::<S, T>).delete(handlers::drop_table::<S, T>),
        )
        .route("/table/{owner}", post(handlers::create_table::<S, T>))
        .route("/{table}/columns", get(handlers::columns::<S, T>))
        .route("/tables/{owner}", get(handlers::list_tables::<S, T>))
        .route("/views/{owner}", get(handlers::list_views::<S, T>))
        .route(
            "/view/{owner}/{name}",
            axum::routing::delete(handlers::drop_view::<S, T>),
        )
        .route("/view/{owner}", post(handlers::create_view::<S, T>))
        .route("/body/{owner}/{name}", get(handlers::body::<S, T>))
        .route("/query", post(handlers::run_query::<S, T>))
        .route("/data-types", get(handlers::data_types::<S, T>))
        .route("/erd", post(handlers::erd::<S, T>))
        .route("/ddl/{owner}/{name}/{kind}", get(handlers::ddl::<S, T>))
        .route("/migration/{owner}", post(handlers::migrate::<S, T>))
        .with_state(state);

    let prefix = prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        api
    } else {
        Router::new().nest(prefix, api)
    };

    app.layer(TraceLayer::new_for_http()).layer(cors)
}

/// CORS policy: any origin when `origins` is empty, otherwise exactly those.
pub fn cors_layer(origins: &[String]) -> DbResult<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }

    let values = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim()).map_err(|_| {
                DbError::invalid_input(format!("Invalid allowed origin '{}'", origin))
            })
        })
        .collect::<DbResult<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(values))
        .allow_methods(Any)
        .allow_headers(Any))
}

/// HTTP transport implementation.
pub struct HttpTransport<S, T> {
    state: AppState<S, T>,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// Path prefix for every route (e.g., "/api")
    prefix: String,
    allowed_origins: Vec<String>,
}

impl<S, T> HttpTransport<S, T>
where
    S: SourceConnector,
    T: TargetConnector,
{
    pub fn new(
        state: AppState<S, T>,
        host: impl Into<String>,
        port: u16,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            state,
            host: host.into(),
            port,
            prefix: prefix.into(),
            allowed_origins: Vec::new(),
        }
    }

    /// Restrict CORS to these origins.
    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the route prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn router(&self) -> DbResult<Router> {
        let cors = cors_layer(&self.allowed_origins)?;
        Ok(build_router(self.state.clone(), &self.prefix, cors))
    }
}

impl<S, T> Transport for HttpTransport<S, T>
where
    S: SourceConnector,
    T: TargetConnector,
{
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting console API on {}", bind_addr);

        let app = self.router()?;

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(prefix = %self.prefix, "Console API ready");

        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race the server against a forced exit after the first signal
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(DbError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
                    "Waiting for in-flight requests (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
