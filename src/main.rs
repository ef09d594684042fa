//! Database console - Main entry point.
//!
//! Serves the JSON API behind the web console: schema browsing, ad-hoc SQL,
//! DDL, ERD and schema migration against Oracle, with PostgreSQL as the
//! migration target.

use clap::Parser;
use db_console::config::Config;
use db_console::db::{OracleConnector, PostgresConnector};
use db_console::transport::{AppState, HttpTransport, Transport};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    info!(
        bind = %config.http_bind_addr(),
        prefix = %config.api_prefix,
        "Starting db-console v{}",
        env!("CARGO_PKG_VERSION")
    );

    let state = AppState::new(OracleConnector, PostgresConnector);
    let transport = HttpTransport::new(
        state,
        &config.http_host,
        config.http_port,
        &config.api_prefix,
    )
    .with_allowed_origins(config.allowed_origins.clone());

    if let Err(e) = transport.run().await {
        error!(error = %e, transport = transport.name(), "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
