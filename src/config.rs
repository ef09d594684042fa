//! Configuration handling for the database console.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Database credentials are never part of the server configuration: every request carries
//! its own connection descriptor.

use clap::Parser;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 3001;
pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Database console API server.
#[derive(Parser, Debug, Clone)]
#[command(name = "db-console")]
#[command(version, about, long_about = None)]
pub struct Config {
    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "DB_CONSOLE_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "DB_CONSOLE_HTTP_PORT"
    )]
    pub http_port: u16,

    /// Path prefix for every API route ("/" serves at the root)
    #[arg(
        long,
        default_value = DEFAULT_API_PREFIX,
        env = "DB_CONSOLE_API_PREFIX"
    )]
    pub api_prefix: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DB_CONSOLE_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_CONSOLE_JSON_LOGS")]
    pub json_logs: bool,

    /// Origins allowed by CORS.
    /// Can be specified multiple times or as comma-separated values.
    /// When empty, any origin is allowed.
    #[arg(
        long = "allowed-origin",
        value_name = "ORIGIN",
        env = "DB_CONSOLE_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allowed_origins: Vec<String>,
}

impl Config {
    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            allowed_origins: Vec::new(),
        }
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Validate settings clap cannot check on its own.
    pub fn validate(&self) -> Result<(), String> {
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(format!(
                "api prefix '{}' must start with '/'",
                self.api_prefix
            ));
        }
        if self.allowed_origins.iter().any(|o| o.trim().is_empty()) {
            return Err("allowed origins must not be empty strings".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
