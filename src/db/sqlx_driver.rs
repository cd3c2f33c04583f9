//! Native database sessions built on sqlx.
//!
//! One dedicated `sqlx::Connection` is opened per request (no pool). The session type
//! is database-specific so that every engine keeps its full type support:
//! - `Postgres`: `PgConnection`
//! - `MySql`: `MySqlConnection` (also MariaDB)
//! - `SQLite`: `SqliteConnection`
//!
//! Statements without parameters are sent as raw SQL; some statements (DDL, stored
//! procedure calls) are not accepted by every server as prepared statements.

use crate::db::driver::{Driver, Session};
use crate::db::rows::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, DatabaseType, QueryParam, Row};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::PgConnectOptions;
use sqlx::query::Query;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::types::Json;
use sqlx::{
    ConnectOptions, Connection, Database, Encode, Executor, MySqlConnection, PgConnection,
    SqliteConnection, Type,
};
use std::sync::Arc;
use tracing::debug;

/// Driver that opens native sqlx connections for the configured engine.
#[derive(Debug, Clone)]
pub struct SqlxDriver {
    config: Arc<ConnectionConfig>,
}

impl SqlxDriver {
    pub fn new(config: Arc<ConnectionConfig>) -> Self {
        Self { config }
    }

    fn postgres_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(self.config.host())
            .port(self.config.port())
            .database(self.config.database())
            .username(self.config.user())
            .password(self.config.password())
            .application_name(env!("CARGO_PKG_NAME"))
    }

    fn mysql_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(self.config.host())
            .port(self.config.port())
            .database(self.config.database())
            .username(self.config.user())
            .password(self.config.password())
    }

    fn sqlite_options(&self) -> SqliteConnectOptions {
        // Never create a database by accident; the path must point at an existing file.
        SqliteConnectOptions::new()
            .filename(self.config.database())
            .create_if_missing(false)
    }
}

impl Driver for SqlxDriver {
    type Session = SqlxSession;

    async fn attach(&self) -> DbResult<SqlxSession> {
        debug!(
            db_type = %self.config.db_type(),
            target = %self.config.target(),
            "Opening database connection"
        );
        let session = match self.config.db_type() {
            DatabaseType::PostgreSQL => {
                SqlxSession::Postgres(self.postgres_options().connect().await?)
            }
            DatabaseType::MySQL => SqlxSession::MySql(self.mysql_options().connect().await?),
            DatabaseType::SQLite => SqlxSession::SQLite(self.sqlite_options().connect().await?),
        };
        Ok(session)
    }
}

/// A single native connection owned by one request.
#[derive(Debug)]
pub enum SqlxSession {
    MySql(MySqlConnection),
    Postgres(PgConnection),
    SQLite(SqliteConnection),
}

impl SqlxSession {
    /// Run a statement that takes no part in parameter binding.
    async fn execute_raw(&mut self, sql: &str) -> DbResult<u64> {
        let rows_affected = match self {
            SqlxSession::MySql(conn) => conn.execute(sql).await?.rows_affected(),
            SqlxSession::Postgres(conn) => conn.execute(sql).await?.rows_affected(),
            SqlxSession::SQLite(conn) => conn.execute(sql).await?.rows_affected(),
        };
        Ok(rows_affected)
    }
}

impl Session for SqlxSession {
    async fn fetch_rows(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        let rows = match self {
            SqlxSession::MySql(conn) => to_json_rows(if params.is_empty() {
                conn.fetch_all(sql).await?
            } else {
                bind_params(sqlx::query(sql), params).fetch_all(conn).await?
            })?,
            SqlxSession::Postgres(conn) => to_json_rows(if params.is_empty() {
                conn.fetch_all(sql).await?
            } else {
                bind_params(sqlx::query(sql), params).fetch_all(conn).await?
            })?,
            SqlxSession::SQLite(conn) => to_json_rows(if params.is_empty() {
                conn.fetch_all(sql).await?
            } else {
                bind_params(sqlx::query(sql), params).fetch_all(conn).await?
            })?,
        };
        Ok(rows)
    }

    async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<Option<u64>> {
        if params.is_empty() {
            return self.execute_raw(sql).await.map(Some);
        }
        let rows_affected = match self {
            SqlxSession::MySql(conn) => bind_params(sqlx::query(sql), params)
                .execute(conn)
                .await?
                .rows_affected(),
            SqlxSession::Postgres(conn) => bind_params(sqlx::query(sql), params)
                .execute(conn)
                .await?
                .rows_affected(),
            SqlxSession::SQLite(conn) => bind_params(sqlx::query(sql), params)
                .execute(conn)
                .await?
                .rows_affected(),
        };
        Ok(Some(rows_affected))
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.execute_raw("BEGIN").await.map(|_| ())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.execute_raw("COMMIT").await.map(|_| ())
    }

    async fn detach(self) -> DbResult<()> {
        match self {
            SqlxSession::MySql(conn) => conn.close().await,
            SqlxSession::Postgres(conn) => conn.close().await,
            SqlxSession::SQLite(conn) => conn.close().await,
        }
        .map_err(DbError::from)
    }
}

fn to_json_rows<R: RowToJson>(rows: Vec<R>) -> DbResult<Vec<Row>> {
    rows.iter().map(RowToJson::to_json_map).collect()
}

/// Bind every parameter, in order, to a prepared statement.
fn bind_params<'q, DB>(
    query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    params: &'q [QueryParam],
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    Option<String>: Encode<'q, DB> + Type<DB>,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    Json<&'q JsonValue>: Encode<'q, DB> + Type<DB>,
{
    params.iter().fold(query, |query, param| match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Json(v) => query.bind(Json(v)),
    })
}
