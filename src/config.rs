//! Configuration handling for the SQL gateway.
//!
//! Every setting can be given as a CLI flag or an environment variable. Database
//! parameters are validated once, at startup, into an immutable [`ConnectionConfig`].

use crate::models::{ConnectionConfig, ConnectionConfigError, ConnectionParams, DatabaseType};
use clap::Parser;

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 3050;
pub const DEFAULT_BASE_PATH: &str = "/api";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration for the SQL gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sql-gateway",
    about = "HTTP gateway that runs allow-listed SQL statements against one database",
    version
)]
pub struct Config {
    /// Database engine (postgres, mysql, sqlite)
    #[arg(long, value_enum, default_value = "postgres", env = "DB_ENGINE")]
    pub db_engine: DatabaseType,

    /// Database server host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database server port
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<u16>,

    /// Database name, or file path for SQLite
    #[arg(long, env = "DB_PATH")]
    pub db_path: Option<String>,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// HTTP host to bind to
    #[arg(long, default_value = DEFAULT_API_HOST, env = "API_HOST")]
    pub api_host: String,

    /// HTTP port to bind to
    #[arg(long, default_value_t = DEFAULT_API_PORT, env = "API_PORT")]
    pub api_port: u16,

    /// Path prefix for every route
    #[arg(long, default_value = DEFAULT_BASE_PATH, env = "API_BASE_PATH")]
    pub base_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "LOG_JSON")]
    pub json_logs: bool,
}

impl Config {
    /// Validate the database parameters for the selected engine.
    pub fn connection_config(&self) -> Result<ConnectionConfig, ConnectionConfigError> {
        ConnectionConfig::new(
            self.db_engine,
            ConnectionParams {
                host: self.db_host.clone(),
                port: self.db_port,
                database: self.db_path.clone(),
                user: self.db_user.clone(),
                password: self.db_password.clone(),
            },
        )
    }
}

/// Normalize a route prefix: leading slash, no trailing slash, `/` becomes empty.
pub fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["sql-gateway"];
        argv.extend_from_slice(args);
        Config::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.db_engine, DatabaseType::PostgreSQL);
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.api_port, DEFAULT_API_PORT);
        assert_eq!(config.base_path, DEFAULT_BASE_PATH);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_api_flags() {
        let config = parse(&["--api-host", "127.0.0.1", "--api-port", "8080"]);
        assert_eq!(config.api_host, "127.0.0.1");
        assert_eq!(config.api_port, 8080);
    }

    #[test]
    fn test_engine_aliases() {
        assert_eq!(
            parse(&["--db-engine", "postgresql"]).db_engine,
            DatabaseType::PostgreSQL
        );
        assert_eq!(
            parse(&["--db-engine", "mariadb"]).db_engine,
            DatabaseType::MySQL
        );
        assert_eq!(
            parse(&["--db-engine", "sqlite"]).db_engine,
            DatabaseType::SQLite
        );
    }

    #[test]
    fn test_server_engine_reports_every_missing_parameter() {
        let config = parse(&["--db-engine", "mysql", "--db-host", "db.local"]);
        let err = config.connection_config().unwrap_err();
        assert_eq!(
            err.missing(),
            &["DB_PORT", "DB_PATH", "DB_USER", "DB_PASSWORD"]
        );
    }

    #[test]
    fn test_complete_server_config() {
        let config = parse(&[
            "--db-host",
            "db.local",
            "--db-port",
            "5432",
            "--db-path",
            "inventory",
            "--db-user",
            "app",
            "--db-password",
            "secret",
        ]);
        let conn = config.connection_config().unwrap();
        assert_eq!(conn.db_type(), DatabaseType::PostgreSQL);
        assert_eq!(conn.host(), "db.local");
        assert_eq!(conn.port(), 5432);
        assert_eq!(conn.database(), "inventory");
    }

    #[test]
    fn test_sqlite_needs_only_path() {
        let config = parse(&["--db-engine", "sqlite", "--db-path", "/tmp/app.db"]);
        assert!(config.connection_config().is_ok());

        let config = parse(&["--db-engine", "sqlite"]);
        assert_eq!(
            config.connection_config().unwrap_err().missing(),
            &["DB_PATH"]
        );
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path("/api"), "/api");
        assert_eq!(normalize_base_path("api/"), "/api");
        assert_eq!(normalize_base_path("/v1/sql/"), "/v1/sql");
        assert_eq!(normalize_base_path("/"), "");
        assert_eq!(normalize_base_path(""), "");
    }
}
