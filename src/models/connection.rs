//! Connection-related data models.
//!
//! This module defines the database engine type and the validated, immutable
//! connection parameters the gateway is started with.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Supported database engines.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    #[value(name = "postgres", alias = "postgresql")]
    PostgreSQL,
    /// Includes MariaDB
    #[value(name = "mysql", alias = "mariadb")]
    MySQL,
    #[value(name = "sqlite")]
    SQLite,
}

impl DatabaseType {
    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Whether the engine is reached over the network (host, port and credentials apply).
    pub fn is_server(&self) -> bool {
        !matches!(self, Self::SQLite)
    }

    /// Statement used by the connection probe to read the server clock as text.
    pub fn server_time_sql(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "SELECT CAST(CURRENT_TIMESTAMP AS TEXT) AS server_time",
            Self::MySQL => "SELECT CAST(CURRENT_TIMESTAMP AS CHAR) AS server_time",
            Self::SQLite => "SELECT CURRENT_TIMESTAMP AS server_time",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfigError {
    #[error("Missing database configuration: {}", .0.join(", "))]
    MissingParameters(Vec<&'static str>),
}

impl ConnectionConfigError {
    /// Names of the parameters that were absent or blank.
    pub fn missing(&self) -> &[&'static str] {
        match self {
            Self::MissingParameters(names) => names,
        }
    }
}

/// Raw connection parameters, as read from flags or the environment.
///
/// Field names in error reports use the environment variable names.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Validated connection configuration.
///
/// Built once at startup and shared read-only; there is no way to mutate it afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    db_type: DatabaseType,
    host: String,
    port: u16,
    database: String,
    user: String,
    /// Contains sensitive data - never log
    password: String,
}

impl ConnectionConfig {
    /// Validate raw parameters for the given engine.
    ///
    /// Server engines need host, port, database, user and password. SQLite only needs
    /// the database path. Every missing parameter is reported, not just the first.
    pub fn new(
        db_type: DatabaseType,
        params: ConnectionParams,
    ) -> Result<Self, ConnectionConfigError> {
        fn present(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.trim().is_empty())
        }

        let host = present(params.host);
        let database = present(params.database);
        let user = present(params.user);
        // Passwords are taken verbatim; only absence counts as missing.
        let password = params.password.filter(|p| !p.is_empty());

        let mut missing = Vec::new();
        if db_type.is_server() {
            if host.is_none() {
                missing.push("DB_HOST");
            }
            if params.port.is_none() {
                missing.push("DB_PORT");
            }
        }
        if database.is_none() {
            missing.push("DB_PATH");
        }
        if db_type.is_server() {
            if user.is_none() {
                missing.push("DB_USER");
            }
            if password.is_none() {
                missing.push("DB_PASSWORD");
            }
        }
        if !missing.is_empty() {
            return Err(ConnectionConfigError::MissingParameters(missing));
        }

        Ok(Self {
            db_type,
            host: host.unwrap_or_default(),
            port: params.port.unwrap_or_default(),
            database: database.unwrap_or_default(),
            user: user.unwrap_or_default(),
            password: password.unwrap_or_default(),
        })
    }

    /// Shorthand for a SQLite database file.
    pub fn sqlite(path: impl Into<String>) -> Result<Self, ConnectionConfigError> {
        Self::new(
            DatabaseType::SQLite,
            ConnectionParams {
                database: Some(path.into()),
                ..Default::default()
            },
        )
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Database name, or the file path for SQLite.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Display-safe description of the target (no credentials).
    pub fn target(&self) -> String {
        if self.db_type.is_server() {
            format!("{}:{}/{}", self.host, self.port, self.database)
        } else {
            self.database.clone()
        }
    }

    /// Connection details that may be echoed back to clients.
    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            engine: self.db_type,
            host: self.db_type.is_server().then(|| self.host.clone()),
            port: self.db_type.is_server().then_some(self.port),
            database: self.database.clone(),
            user: self.db_type.is_server().then(|| self.user.clone()),
        }
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Connection information returned by the probe endpoint (no secrets exposed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub engine: DatabaseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}
