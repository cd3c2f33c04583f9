//! SQL Gateway - Main entry point.
//!
//! Exposes `/query` and `/execute` over HTTP for one configured database
//! (PostgreSQL, MySQL, SQLite).

use clap::Parser;
use sql_gateway::config::Config;
use sql_gateway::db::SqlxDriver;
use sql_gateway::gateway::Gateway;
use sql_gateway::transport::{HttpTransport, Transport};
use std::sync::Arc;
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
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    // Incomplete database settings are fatal; nothing else is
    let connection_config = match config.connection_config() {
        Ok(connection_config) => Arc::new(connection_config),
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!(
                "Set the missing values as environment variables or flags: {}",
                e.missing().join(", ")
            );
            eprintln!();
            eprintln!("Examples:");
            eprintln!(
                "  DB_HOST=localhost DB_PORT=5432 DB_PATH=app DB_USER=app DB_PASSWORD=secret sql-gateway"
            );
            eprintln!("  sql-gateway --db-engine sqlite --db-path ./data.db");
            std::process::exit(1);
        }
    };

    info!(
        engine = %connection_config.db_type(),
        database = %connection_config.target(),
        "Starting SQL Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let driver = SqlxDriver::new(connection_config.clone());
    let gateway = Arc::new(Gateway::new(connection_config, driver));

    let transport = HttpTransport::new(
        gateway,
        &config.api_host,
        config.api_port,
        &config.base_path,
    );
    info!(
        transport = transport.name(),
        addr = %transport.bind_addr(),
        base_path = %transport.base_path(),
        "Using HTTP transport"
    );

    if let Err(e) = transport.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
