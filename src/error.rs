//! Error types for the SQL gateway.
//!
//! Two layers are defined with `thiserror`:
//! - [`DbError`]: what the database driver reported, independent of the request stage.
//! - [`GatewayError`]: the fixed failure taxonomy returned to clients. Each variant maps
//!   to one HTTP status code; driver details ride along as auxiliary context.
//! - [`ServerError`]: the listener could not be bound or the server loop failed.

use crate::models::EntryPoint;
use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    /// The session could not be opened or was lost at the transport level.
    #[error("Connection failed: {message}")]
    Connection { message: String },

    /// The server rejected a statement.
    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    /// Decoding or driver-internal failure.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a database error with optional SQL state.
    pub fn database(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Database {
            message: message.into(),
            sql_state,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The driver's own message, without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection { message }
            | Self::Database { message, .. }
            | Self::Internal { message } => message,
        }
    }

    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Database { sql_state, .. } => sql_state.as_deref(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::database(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::database("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::connection("Timed out acquiring a connection"),
            sqlx::Error::PoolClosed => DbError::connection("Connection is closed"),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::database(format!("Type not found: {}", type_name), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::database(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::AnyDriverError(err) => {
                DbError::connection(format!("Driver error: {}", err))
            }
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Failure kinds surfaced at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Permission,
    Connection,
    Query,
    Commit,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::Permission => "PermissionError",
            Self::Connection => "ConnectionError",
            Self::Query => "QueryError",
            Self::Commit => "CommitError",
            Self::Internal => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::Permission => StatusCode::FORBIDDEN,
            Self::Connection | Self::Query | Self::Commit | Self::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Invalid request: {message}")]
    Validation { message: String },

    #[error("Permission denied: {message}")]
    Permission { message: String },

    #[error("Connection failed: {source}")]
    Connection { source: DbError },

    #[error("Statement failed on /{entry_point}: {source}")]
    Query {
        source: DbError,
        sql: String,
        entry_point: EntryPoint,
    },

    #[error("Commit failed: {source}")]
    Commit { source: DbError },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        detail: Option<String>,
    },
}

impl GatewayError {
    /// The request carried no usable SQL.
    pub fn missing_sql() -> Self {
        Self::Validation {
            message: "SQL query is required".to_string(),
        }
    }

    /// The request body could not be decoded.
    pub fn invalid_body(reason: impl Into<String>) -> Self {
        Self::Validation {
            message: format!("Invalid request body: {}", reason.into()),
        }
    }

    /// The statement's verb is not allowed on this entry point.
    pub fn rejected(entry_point: EntryPoint) -> Self {
        let message = match entry_point {
            EntryPoint::Read => {
                "Only SELECT queries are allowed on this endpoint. Use /execute for other operations."
            }
            EntryPoint::Write => {
                "This endpoint only accepts INSERT, UPDATE, DELETE, EXECUTE, CREATE, DROP or ALTER. Use /query for SELECT."
            }
        };
        Self::Permission {
            message: message.to_string(),
        }
    }

    /// Map a failure to open the session. Always a connection error.
    pub fn from_attach(source: DbError) -> Self {
        Self::Connection { source }
    }

    /// Map a failure while running the statement.
    ///
    /// Decode and driver-internal failures are internal errors; everything else the
    /// driver reports is a query error carrying the SQL as context.
    pub fn from_statement(source: DbError, sql: &str, entry_point: EntryPoint) -> Self {
        match source {
            DbError::Internal { message } => Self::Internal {
                message: "Failed to read statement results".to_string(),
                detail: Some(message),
            },
            source => Self::Query {
                source,
                sql: sql.to_string(),
                entry_point,
            },
        }
    }

    /// Map a failure of the explicit commit. Always a commit error.
    pub fn from_commit(source: DbError) -> Self {
        Self::Commit { source }
    }

    /// Any failure that escaped the pipeline.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            message: "Internal server error".to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Query { .. } => ErrorKind::Query,
            Self::Commit { .. } => ErrorKind::Commit,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }

    /// Client-facing summary of what went wrong.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message } | Self::Permission { message } => message,
            Self::Internal { message, .. } => message,
            Self::Connection { .. } => "Failed to connect to the database",
            Self::Query {
                entry_point: EntryPoint::Read,
                ..
            } => "Failed to execute query",
            Self::Query {
                entry_point: EntryPoint::Write,
                ..
            } => "Failed to execute command",
            Self::Commit { .. } => "Failed to commit transaction",
        }
    }

    /// The underlying driver message, when there is one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } | Self::Permission { .. } => None,
            Self::Connection { source } | Self::Commit { source } | Self::Query { source, .. } => {
                Some(source.message())
            }
            Self::Internal { detail, .. } => detail.as_deref(),
        }
    }

    /// Echoed SQL and SQLSTATE, when the failure concerns a statement.
    pub fn context(&self) -> Option<serde_json::Value> {
        match self {
            Self::Query { source, sql, .. } => {
                let mut context = serde_json::json!({ "sql": sql });
                if let Some(state) = source.sql_state() {
                    context["sqlState"] = serde_json::Value::String(state.to_string());
                }
                Some(context)
            }
            Self::Commit { source } => source
                .sql_state()
                .map(|state| serde_json::json!({ "sqlState": state })),
            _ => None,
        }
    }
}

/// Failures of the HTTP server itself, outside any request.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}
