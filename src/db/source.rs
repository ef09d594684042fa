//! Source engine abstraction.
//!
//! Every console request opens one fresh source connection, runs its
//! statements, and releases the connection on every exit path. There is no
//! pooling; see [`release`].

use crate::error::DbResult;
use crate::models::{RowSet, SourceDescriptor, SqlValue};
use futures_util::stream::BoxStream;
use std::future::Future;
use tracing::warn;

/// First-column values of a streamed query, in arrival order.
pub type ValueStream = BoxStream<'static, DbResult<SqlValue>>;

/// An open connection to the source engine.
pub trait SourceConnection: Send + Sync {
    /// Run one statement with positional binds.
    ///
    /// Queries return their rows; any other statement is committed immediately
    /// and reports `rows_affected`.
    fn run(&self, sql: &str, binds: &[&str]) -> impl Future<Output = DbResult<RowSet>> + Send;

    /// Run a query and stream the first column of each row as the driver
    /// yields it. Used to drain large text values chunk by chunk.
    fn stream_values(
        &self,
        sql: &str,
        binds: &[&str],
    ) -> impl Future<Output = DbResult<ValueStream>> + Send;

    /// Close the connection.
    fn close(self) -> impl Future<Output = DbResult<()>> + Send
    where
        Self: Sized;
}

/// Opens source connections from per-request descriptors.
pub trait SourceConnector: Send + Sync + 'static {
    type Connection: SourceConnection + 'static;

    fn connect(
        &self,
        descriptor: &SourceDescriptor,
    ) -> impl Future<Output = DbResult<Self::Connection>> + Send;
}

/// Close `conn` and hand back `result` unchanged.
///
/// A failed close is logged; it never replaces the operation's own outcome.
pub async fn release<C, T>(conn: C, result: DbResult<T>) -> DbResult<T>
where
    C: SourceConnection,
{
    if let Err(e) = conn.close().await {
        warn!(error = %e, "Failed to close source connection");
    }
    result
}
