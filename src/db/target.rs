//! Target engine abstraction and its PostgreSQL implementation.
//!
//! The target only ever receives generated DDL/DML text, one statement at a
//! time, so the seam is deliberately narrow: execute and close.

use crate::error::{DbError, DbResult};
use crate::models::TargetDescriptor;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::future::Future;
use tracing::{debug, warn};

/// An open connection to the migration target.
pub trait TargetConnection: Send {
    /// Execute one statement, auto-committed. Returns rows affected.
    fn execute(&mut self, sql: &str) -> impl Future<Output = DbResult<u64>> + Send;

    fn close(self) -> impl Future<Output = DbResult<()>> + Send
    where
        Self: Sized;
}

/// Opens target connections from per-request descriptors.
pub trait TargetConnector: Send + Sync + 'static {
    type Connection: TargetConnection + 'static;

    fn connect(
        &self,
        descriptor: &TargetDescriptor,
    ) -> impl Future<Output = DbResult<Self::Connection>> + Send;
}

/// Close `conn` and hand back `result` unchanged.
pub async fn release_target<C, T>(conn: C, result: DbResult<T>) -> DbResult<T>
where
    C: TargetConnection,
{
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close target connection");
    }
    result
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresConnector;

impl TargetConnector for PostgresConnector {
    type Connection = PostgresConnection;

    async fn connect(&self, descriptor: &TargetDescriptor) -> DbResult<PostgresConnection> {
        descriptor.validate()?;

        debug!(
            host = %descriptor.host,
            port = descriptor.port,
            database = %descriptor.database,
            user = %descriptor.user,
            "Opening PostgreSQL connection"
        );

        let conn = PgConnectOptions::new()
            .host(descriptor.host.trim())
            .port(descriptor.port)
            .username(&descriptor.user)
            .password(&descriptor.password)
            .database(descriptor.database.trim())
            .connect()
            .await
            .map_err(|e| {
                DbError::connection(
                    format!("Failed to connect: {}", e),
                    connection_suggestion(&e),
                )
            })?;

        Ok(PostgresConnection { conn })
    }
}

fn connection_suggestion(err: &sqlx::Error) -> &'static str {
    let msg = err.to_string().to_lowercase();
    if msg.contains("password") || msg.contains("authentication") {
        "Check pgUser and pgPassword"
    } else if msg.contains("does not exist") {
        "Create the target database first; only the schema is created automatically"
    } else if msg.contains("refused") || msg.contains("timed out") {
        "Check pgHost and pgPort and that the server accepts TCP connections"
    } else {
        "Check the target connection settings"
    }
}

pub struct PostgresConnection {
    conn: PgConnection,
}

impl TargetConnection for PostgresConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        // Plain &str goes over the simple-query protocol: no prepare, no binds.
        let result = (&mut self.conn).execute(sql).await?;
        Ok(result.rows_affected())
    }

    async fn close(self) -> DbResult<()> {
        self.conn.close().await?;
        debug!("Closed PostgreSQL connection");
        Ok(())
    }
}
