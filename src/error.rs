//! Error types for the database console.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Driver errors from both engines are folded into [`DbError`], which also knows how
//! to render itself as an HTTP response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

/// Engine code returned when a catalog view does not exist for the current
/// credential (either missing or not granted).
pub const INSUFFICIENT_PRIVILEGES_CODE: &str = "ORA-00942";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "ORA-00942" for Oracle, "42P07" for PostgreSQL
        code: Option<String>,
        suggestion: String,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a database error with an optional engine code.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// Engine-specific error code, if the driver reported one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Database { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// True when the engine refused a catalog view for lack of privileges.
    pub fn is_insufficient_privileges(&self) -> bool {
        self.code() == Some(INSUFFICIENT_PRIVILEGES_CODE)
    }

    /// HTTP status for this error: caller mistakes are 400, everything else 500.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message without the variant prefix, as surfaced to the console.
    pub fn detail(&self) -> &str {
        match self {
            Self::Connection { message, .. }
            | Self::Database { message, .. }
            | Self::InvalidInput { message }
            | Self::Internal { message } => message,
            Self::Timeout { operation, .. } => operation,
        }
    }
}

/// Convert Oracle driver errors to DbError.
impl From<oracle::Error> for DbError {
    fn from(err: oracle::Error) -> Self {
        match err {
            oracle::Error::OciError(db_err) | oracle::Error::DpiError(db_err) => DbError::database(
                db_err.message().trim_end(),
                Some(format!("ORA-{:05}", db_err.code())),
                "Check the SQL syntax, referenced objects and granted privileges",
            ),
            oracle::Error::NoDataFound => DbError::database(
                "No rows returned",
                None,
                "Verify the object name and owner",
            ),
            other => DbError::internal(format!("Oracle driver error: {}", other)),
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the target host, port, database and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(
                    db_err.message(),
                    code,
                    "Check the generated statement and the target schema",
                )
            }
            sqlx::Error::RowNotFound => DbError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection acquire", 30),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbError::internal(format!("Driver task failed: {}", err))
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl IntoResponse for DbError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_client_error() {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        } else {
            error!(status = status.as_u16(), error = %self, "Request failed");
        }
        let body = match self.suggestion() {
            Some(suggestion) => serde_json::json!({
                "error": self.detail(),
                "code": self.code(),
                "suggestion": suggestion,
            }),
            None => serde_json::json!({ "error": self.detail() }),
        };
        (status, Json(body)).into_response()
    }
}
