//! Database console library
//!
//! Backend for a web database-administration console: browse an Oracle
//! schema tree, run SQL, fetch DDL, draw ERDs, and copy a schema to
//! PostgreSQL, all over a JSON HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod transport;

pub use config::Config;
pub use error::DbError;
