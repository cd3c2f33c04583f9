//! The SQL gateway.
//!
//! Each statement request goes through the same pipeline:
//! 1. validate the body (ValidationError, no connection opened)
//! 2. classify the verb for the entry point (PermissionError, no connection opened)
//! 3. acquire a dedicated session (ConnectionError)
//! 4. run the statement and apply the commit policy
//! 5. release the session, whatever step 4 returned
//!
//! A panic while the statement runs is caught and reported as an InternalError, and
//! the session is still released before the error is returned. A panic anywhere else
//! is caught by an outer boundary; a session held at that point is detached in the
//! background by the connection guard's drop.

pub mod classifier;
pub mod envelope;

pub use classifier::classify;
pub use envelope::{error_body, format_outcome, timestamp};

use crate::db::{ConnectionManager, Driver, Session, TransactionExecutor};
use crate::error::GatewayError;
use crate::models::{
    ConnectionConfig, ConnectionSummary, EntryPoint, ExecutionOutcome, StatementBody,
    StatementRequest,
};
use futures_util::FutureExt;
use serde_json::Value as JsonValue;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a connectivity probe.
#[derive(Debug, Clone)]
pub struct ConnectionProbe {
    /// Current time as reported by the database server.
    pub server_time: JsonValue,
    /// Connection settings, without the password.
    pub config: ConnectionSummary,
}

/// Validates, classifies and executes statements against one configured database.
pub struct Gateway<D: Driver> {
    config: Arc<ConnectionConfig>,
    connections: ConnectionManager<D>,
    executor: TransactionExecutor,
}

impl<D: Driver> Gateway<D> {
    pub fn new(config: Arc<ConnectionConfig>, driver: D) -> Self {
        Self {
            config,
            connections: ConnectionManager::new(driver),
            executor: TransactionExecutor::new(),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Read entry point: SELECT only.
    pub async fn query(&self, body: StatementBody) -> Result<ExecutionOutcome, GatewayError> {
        self.handle(EntryPoint::Read, body).await
    }

    /// Write entry point: DML with commit, DDL without.
    pub async fn execute(&self, body: StatementBody) -> Result<ExecutionOutcome, GatewayError> {
        self.handle(EntryPoint::Write, body).await
    }

    /// Run a statement request under the panic boundary.
    pub async fn handle(
        &self,
        entry_point: EntryPoint,
        body: StatementBody,
    ) -> Result<ExecutionOutcome, GatewayError> {
        guarded(self.dispatch(entry_point, body)).await
    }

    async fn dispatch(
        &self,
        entry_point: EntryPoint,
        body: StatementBody,
    ) -> Result<ExecutionOutcome, GatewayError> {
        let request = StatementRequest::from_body(body).ok_or_else(|| {
            warn!(entry_point = %entry_point, "Request without SQL");
            GatewayError::missing_sql()
        })?;

        let category = classify(entry_point, request.sql());
        if category.is_rejected() {
            warn!(
                entry_point = %entry_point,
                sql = %request.preview(self.executor.preview_chars()),
                "Statement rejected by verb allow-list"
            );
            return Err(GatewayError::rejected(entry_point));
        }

        info!(
            entry_point = %entry_point,
            category = ?category,
            sql = %request.preview(self.executor.preview_chars()),
            "Running statement"
        );

        let mut guard = self.connections.acquire().await.map_err(|e| {
            error!(error = %e, "Failed to connect to the database");
            GatewayError::from_attach(e)
        })?;

        let result = guarded(
            self.executor
                .run(guard.session(), &request, category, entry_point),
        )
        .await;
        guard.release().await;

        if let Err(e) = &result {
            error!(kind = %e.kind(), error = %e, "Statement failed");
        }
        result
    }

    /// Open a session, ask the server for its current time and close the session.
    pub async fn test_connection(&self) -> Result<ConnectionProbe, GatewayError> {
        guarded(self.probe()).await
    }

    async fn probe(&self) -> Result<ConnectionProbe, GatewayError> {
        info!(target = %self.config.target(), "Testing database connection");
        let sql = self.config.db_type().server_time_sql();

        let mut guard = self.connections.acquire().await.map_err(|e| {
            error!(error = %e, "Failed to connect to the database");
            GatewayError::from_attach(e)
        })?;
        let result = guarded(async {
            guard.session().fetch_rows(sql, &[]).await.map_err(|e| {
                error!(error = %e, "Connection test query failed");
                GatewayError::from_statement(e, sql, EntryPoint::Read)
            })
        })
        .await;
        guard.release().await;

        let rows = result?;
        let server_time = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next().map(|(_, value)| value))
            .unwrap_or(JsonValue::Null);

        info!("Database connection established");
        Ok(ConnectionProbe {
            server_time,
            config: self.config.summary(),
        })
    }
}

/// Turn a panic inside `fut` into an InternalError.
async fn guarded<T>(
    fut: impl Future<Output = Result<T, GatewayError>>,
) -> Result<T, GatewayError> {
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            error!(panic = %detail, "Request handler panicked");
            Err(GatewayError::internal(detail))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
