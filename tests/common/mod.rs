//! Scripted engines shared by the integration tests.
//!
//! `FakeSource` answers each statement from the first rule whose pattern
//! occurs in the SQL text (optionally also requiring a bind value), and
//! records every call. A gated source also holds each statement open until
//! a given number are in flight, to observe which reads overlap.
//! `FakeTarget` records every statement and fails the ones matching a
//! configured pattern.

#![allow(dead_code)]

use db_console::db::{
    SourceConnection, SourceConnector, TargetConnection, TargetConnector, ValueStream,
};
use db_console::error::{DbError, DbResult};
use db_console::models::{ColumnMetadata, RowSet, SourceDescriptor, SqlValue, TargetDescriptor};
use futures_util::StreamExt;
use futures_util::stream;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Yields a gated statement waits for company before giving up.
const GATE_SPINS: usize = 64;

/// Query-string form of [`descriptor`].
pub const DESCRIPTOR_QUERY: &str = "user=hr&password=secret&host=db.local&service=XE";

pub fn descriptor() -> SourceDescriptor {
    SourceDescriptor::new("hr", "secret", "db.local", "XE")
}

pub fn target_descriptor() -> TargetDescriptor {
    TargetDescriptor::new("postgres", "pw", "localhost", 5432, "copy")
}

/// A result with VARCHAR2 columns.
pub fn rows(columns: &[&str], data: Vec<Vec<SqlValue>>) -> RowSet {
    RowSet::new(
        columns
            .iter()
            .map(|c| ColumnMetadata::new(*c, "VARCHAR2"))
            .collect(),
        data,
    )
}

/// A one-column result of text values.
pub fn names(column: &str, values: &[&str]) -> RowSet {
    rows(
        &[column],
        values.iter().map(|v| vec![SqlValue::text(*v)]).collect(),
    )
}

pub fn text_row(values: &[&str]) -> Vec<SqlValue> {
    values.iter().map(|v| SqlValue::text(*v)).collect()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Rows(RowSet),
    Fail { code: String, message: String },
    /// Streamed text values, one per row
    Chunks(Vec<String>),
}

impl Reply {
    pub fn denied() -> Self {
        Self::fail("ORA-00942", "table or view does not exist")
    }

    pub fn fail(code: &str, message: &str) -> Self {
        Self::Fail {
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn chunks(parts: &[&str]) -> Self {
        Self::Chunks(parts.iter().map(|p| p.to_string()).collect())
    }

    fn error(code: &str, message: &str) -> DbError {
        DbError::database(message, Some(code.to_string()), "")
    }
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    bind: Option<String>,
    reply: Reply,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    pub binds: Vec<String>,
}

#[derive(Default)]
struct SourceShared {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Call>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse: AtomicBool,
    /// In-flight width a statement waits for; 0 disables the gate
    gate: AtomicUsize,
    in_flight: Mutex<Vec<Vec<String>>>,
    peak_in_flight: AtomicUsize,
    owners_overlapped: AtomicBool,
}

#[derive(Clone, Default)]
pub struct FakeSource {
    shared: Arc<SourceShared>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `pattern`.
    pub fn on(self, pattern: &str, reply: Reply) -> Self {
        self.push(pattern, None, reply)
    }

    /// Answer statements containing `pattern` and bound to `bind`.
    pub fn on_bound(self, pattern: &str, bind: &str, reply: Reply) -> Self {
        self.push(pattern, Some(bind.to_string()), reply)
    }

    /// Fail every connection attempt.
    pub fn refusing(self) -> Self {
        self.shared.refuse.store(true, Ordering::SeqCst);
        self
    }

    /// Hold every statement until `width` statements are in flight (or a
    /// bounded number of yields pass).
    pub fn gated(self, width: usize) -> Self {
        self.shared.gate.store(width, Ordering::SeqCst);
        self
    }

    fn push(self, pattern: &str, bind: Option<String>, reply: Reply) -> Self {
        self.shared.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            bind,
            reply,
        });
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    /// Number of recorded statements containing `pattern`.
    pub fn ran(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|c| c.sql.contains(pattern)).count()
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Most statements seen in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.shared.peak_in_flight.load(Ordering::SeqCst)
    }

    /// True if statements bound to different first values ran together.
    pub fn owners_overlapped(&self) -> bool {
        self.shared.owners_overlapped.load(Ordering::SeqCst)
    }
}

impl SourceShared {
    fn enter(&self, binds: &[String]) -> usize {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(owner) = binds.first() {
            let mixed = in_flight
                .iter()
                .filter_map(|other| other.first())
                .any(|other| other != owner);
            if mixed {
                self.owners_overlapped.store(true, Ordering::SeqCst);
            }
        }
        in_flight.push(binds.to_vec());
        self.peak_in_flight.fetch_max(in_flight.len(), Ordering::SeqCst);
        in_flight.len()
    }

    fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    fn leave(&self, binds: &[String]) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(pos) = in_flight.iter().position(|b| b.as_slice() == binds) {
            in_flight.remove(pos);
        }
    }

    /// Wait, yielding to sibling futures, until enough statements overlap.
    async fn hold(&self, binds: &[&str]) {
        let width = self.gate.load(Ordering::SeqCst);
        if width == 0 {
            return;
        }
        let binds: Vec<String> = binds.iter().map(|b| b.to_string()).collect();
        let mut seen = self.enter(&binds);
        for _ in 0..GATE_SPINS {
            if seen >= width {
                break;
            }
            tokio::task::yield_now().await;
            seen = self.in_flight();
        }
        self.leave(&binds);
    }

    fn answer(&self, sql: &str, binds: &[&str]) -> Option<Reply> {
        self.calls.lock().unwrap().push(Call {
            sql: sql.to_string(),
            binds: binds.iter().map(|b| b.to_string()).collect(),
        });
        self.rules
            .lock()
            .unwrap()
            .iter()
            .find(|rule| {
                sql.contains(&rule.pattern)
                    && rule.bind.as_deref().is_none_or(|b| binds.contains(&b))
            })
            .map(|rule| rule.reply.clone())
    }
}

pub struct FakeSourceConnection {
    shared: Arc<SourceShared>,
}

impl SourceConnection for FakeSourceConnection {
    async fn run(&self, sql: &str, binds: &[&str]) -> DbResult<RowSet> {
        let reply = self.shared.answer(sql, binds);
        self.shared.hold(binds).await;
        match reply {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Fail { code, message }) => Err(Reply::error(&code, &message)),
            Some(Reply::Chunks(parts)) => Ok(names(
                "CHUNK",
                &parts.iter().map(String::as_str).collect::<Vec<_>>(),
            )),
            None if sql.trim_start().to_uppercase().starts_with("SELECT") => Ok(RowSet::default()),
            None => Ok(RowSet::affected(0)),
        }
    }

    async fn stream_values(&self, sql: &str, binds: &[&str]) -> DbResult<ValueStream> {
        let values: Vec<SqlValue> = match self.shared.answer(sql, binds) {
            Some(Reply::Chunks(parts)) => parts.into_iter().map(SqlValue::Text).collect(),
            Some(Reply::Rows(rows)) => rows
                .rows
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect(),
            Some(Reply::Fail { code, message }) => return Err(Reply::error(&code, &message)),
            None => Vec::new(),
        };
        Ok(stream::iter(values.into_iter().map(Ok)).boxed())
    }

    async fn close(self) -> DbResult<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl SourceConnector for FakeSource {
    type Connection = FakeSourceConnection;

    async fn connect(&self, _descriptor: &SourceDescriptor) -> DbResult<FakeSourceConnection> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(DbError::connection(
                "ORA-12541: TNS:no listener",
                "Check host, service name and credentials",
            ));
        }
        Ok(FakeSourceConnection {
            shared: Arc::clone(&self.shared),
        })
    }
}

// =============================================================================
// Target
// =============================================================================

#[derive(Default)]
struct TargetShared {
    failing: Mutex<Vec<String>>,
    executed: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    refuse: AtomicBool,
}

#[derive(Clone, Default)]
pub struct FakeTarget {
    shared: Arc<TargetShared>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every statement containing `pattern`, as a re-run would.
    pub fn failing_on(self, pattern: &str) -> Self {
        self.shared.failing.lock().unwrap().push(pattern.to_string());
        self
    }

    pub fn refusing(self) -> Self {
        self.shared.refuse.store(true, Ordering::SeqCst);
        self
    }

    /// Every statement received, in order, including failed ones.
    pub fn executed(&self) -> Vec<String> {
        self.shared.executed.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }
}

pub struct FakeTargetConnection {
    shared: Arc<TargetShared>,
}

impl TargetConnection for FakeTargetConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<u64> {
        self.shared.executed.lock().unwrap().push(sql.to_string());
        let fails = self
            .shared
            .failing
            .lock()
            .unwrap()
            .iter()
            .any(|p| sql.contains(p.as_str()));
        if fails {
            return Err(DbError::database(
                "relation already exists",
                Some("42P07".to_string()),
                "",
            ));
        }
        Ok(1)
    }

    async fn close(self) -> DbResult<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl TargetConnector for FakeTarget {
    type Connection = FakeTargetConnection;

    async fn connect(&self, _descriptor: &TargetDescriptor) -> DbResult<FakeTargetConnection> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse.load(Ordering::SeqCst) {
            return Err(DbError::connection(
                "Failed to connect: password authentication failed",
                "Check pgUser and pgPassword",
            ));
        }
        Ok(FakeTargetConnection {
            shared: Arc::clone(&self.shared),
        })
    }
}
