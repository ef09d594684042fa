//! Oracle implementation of the source engine.
//!
//! The `oracle` crate is a blocking OCI client, so every driver call runs on
//! the blocking thread pool. The connection sits behind a mutex: the engine
//! serializes calls on one session anyway, and concurrent catalog reads from
//! the tree assembler simply queue on it.

use crate::db::source::{SourceConnection, SourceConnector, ValueStream};
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, RowSet, SourceDescriptor, SqlValue};
use chrono::NaiveDateTime;
use futures_util::StreamExt;
use futures_util::stream;
use oracle::sql_type::{OracleType, ToSql};
use oracle::{Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::debug;

/// Rows buffered between the driver thread and a streaming consumer.
const STREAM_BUFFER: usize = 16;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Opens Oracle sessions over EZConnect.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleConnector;

impl SourceConnector for OracleConnector {
    type Connection = OracleConnection;

    async fn connect(&self, descriptor: &SourceDescriptor) -> DbResult<OracleConnection> {
        descriptor.validate()?;
        let user = descriptor.user.clone();
        let password = descriptor.password.clone();
        let connect_string = descriptor.connect_string();

        debug!(user = %user, connect_string = %connect_string, "Opening Oracle session");

        let conn = tokio::task::spawn_blocking(move || {
            Connection::connect(&user, &password, &connect_string)
        })
        .await?
        .map_err(|e| {
            DbError::connection(
                e.to_string(),
                "Check host, service name and credentials",
            )
        })?;

        Ok(OracleConnection {
            inner: Arc::new(Mutex::new(conn)),
        })
    }
}

/// One Oracle session.
pub struct OracleConnection {
    inner: Arc<Mutex<Connection>>,
}

impl SourceConnection for OracleConnection {
    async fn run(&self, sql: &str, binds: &[&str]) -> DbResult<RowSet> {
        let inner = Arc::clone(&self.inner);
        let sql = sql.to_string();
        let binds = owned(binds);

        debug!(sql = %sql, binds = binds.len(), "Running source statement");

        tokio::task::spawn_blocking(move || {
            let conn = lock(&inner)?;
            run_blocking(&conn, &sql, &binds)
        })
        .await?
    }

    async fn stream_values(&self, sql: &str, binds: &[&str]) -> DbResult<ValueStream> {
        let inner = Arc::clone(&self.inner);
        let sql = sql.to_string();
        let binds = owned(binds);
        let (tx, rx) = mpsc::channel::<DbResult<SqlValue>>(STREAM_BUFFER);

        debug!(sql = %sql, binds = binds.len(), "Streaming source query");

        tokio::task::spawn_blocking(move || {
            let outcome = lock(&inner).and_then(|conn| stream_blocking(&conn, &sql, &binds, &tx));
            // Release the session before the receiver can observe end-of-stream.
            drop(inner);
            if let Err(e) = outcome {
                let _ = tx.blocking_send(Err(e));
            }
        });

        let values = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(values.boxed())
    }

    async fn close(self) -> DbResult<()> {
        let inner = self.inner;
        tokio::task::spawn_blocking(move || match Arc::try_unwrap(inner) {
            Ok(mutex) => {
                let conn = mutex
                    .into_inner()
                    .map_err(|_| DbError::internal("Oracle session lock poisoned"))?;
                conn.close()?;
                debug!("Closed Oracle session");
                Ok(())
            }
            // A streaming task still holds the session; it closes on drop.
            Err(_) => Ok(()),
        })
        .await?
    }
}

fn owned(binds: &[&str]) -> Vec<String> {
    binds.iter().map(|b| b.to_string()).collect()
}

fn lock(inner: &Mutex<Connection>) -> DbResult<MutexGuard<'_, Connection>> {
    inner
        .lock()
        .map_err(|_| DbError::internal("Oracle session lock poisoned"))
}

fn params(binds: &[String]) -> Vec<&dyn ToSql> {
    binds.iter().map(|b| b as &dyn ToSql).collect()
}

fn run_blocking(conn: &Connection, sql: &str, binds: &[String]) -> DbResult<RowSet> {
    let params = params(binds);
    let mut stmt = conn.statement(sql).build()?;

    if !stmt.is_query() {
        stmt.execute(&params)?;
        let affected = stmt.row_count()?;
        conn.commit()?;
        return Ok(RowSet::affected(affected));
    }

    let result_set = stmt.query(&params)?;
    let columns: Vec<(ColumnMetadata, ValueKind)> = result_set
        .column_info()
        .iter()
        .map(|col| {
            (
                ColumnMetadata::new(col.name(), col.oracle_type().to_string()),
                ValueKind::of(col.oracle_type()),
            )
        })
        .collect();

    let mut rows = Vec::new();
    for row in result_set {
        let row = row?;
        let values = columns
            .iter()
            .enumerate()
            .map(|(i, (_, kind))| read_value(&row, i, *kind))
            .collect::<DbResult<Vec<_>>>()?;
        rows.push(values);
    }

    let meta_data = columns.into_iter().map(|(meta, _)| meta).collect();
    Ok(RowSet::new(meta_data, rows))
}

fn stream_blocking(
    conn: &Connection,
    sql: &str,
    binds: &[String],
    tx: &mpsc::Sender<DbResult<SqlValue>>,
) -> DbResult<()> {
    let params = params(binds);
    let mut stmt = conn.statement(sql).build()?;
    let result_set = stmt.query(&params)?;
    let kind = result_set
        .column_info()
        .first()
        .map(|col| ValueKind::of(col.oracle_type()))
        .unwrap_or(ValueKind::Text);

    for row in result_set {
        let value = read_value(&row?, 0, kind)?;
        if tx.blocking_send(Ok(value)).is_err() {
            debug!("Stream consumer went away; stopping fetch");
            break;
        }
    }
    Ok(())
}

/// How a column's values are read out of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Number,
    Timestamp,
    Binary,
    Text,
}

impl ValueKind {
    fn of(oracle_type: &OracleType) -> Self {
        match oracle_type {
            OracleType::Number(_, _)
            | OracleType::Float(_)
            | OracleType::BinaryFloat
            | OracleType::BinaryDouble
            | OracleType::Int64
            | OracleType::UInt64 => Self::Number,
            OracleType::Date | OracleType::Timestamp(_) => Self::Timestamp,
            OracleType::BLOB | OracleType::Raw(_) | OracleType::LongRaw => Self::Binary,
            _ => Self::Text,
        }
    }
}

fn read_value(row: &Row, index: usize, kind: ValueKind) -> DbResult<SqlValue> {
    let value = match kind {
        ValueKind::Number => row
            .get::<usize, Option<String>>(index)?
            .map(SqlValue::Number),
        ValueKind::Timestamp => row
            .get::<usize, Option<NaiveDateTime>>(index)?
            .map(|ts| SqlValue::Timestamp(ts.format(TIMESTAMP_FORMAT).to_string())),
        ValueKind::Binary => row
            .get::<usize, Option<Vec<u8>>>(index)?
            .map(SqlValue::Binary),
        ValueKind::Text => row
            .get::<usize, Option<String>>(index)?
            .map(SqlValue::Text),
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
