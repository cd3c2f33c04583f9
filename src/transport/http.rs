//! HTTP transport for the SQL gateway.
//!
//! Routes (under the configured base path):
//! - `POST /query`: read entry point
//! - `POST /execute`: write entry point
//! - `GET /health`, `GET /info`, `GET /test-connection`
//!
//! Anything else gets a 404 listing the available endpoints.

use crate::db::Driver;
use crate::error::{GatewayError, ServerError};
use crate::gateway::{Gateway, format_outcome, timestamp};
use crate::models::{ExecutionOutcome, StatementBody};
use crate::transport::Transport;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Human-readable service name reported by `/info`.
pub const SERVICE_NAME: &str = "SQL Gateway";

/// Shared state handed to every handler.
struct AppState<D: Driver> {
    gateway: Arc<Gateway<D>>,
    base_path: Arc<str>,
}

impl<D: Driver> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
            base_path: self.base_path.clone(),
        }
    }
}

impl<D: Driver> AppState<D> {
    fn endpoint(&self, method: &str, path: &str) -> String {
        format!("{} {}{}", method, self.base_path, path)
    }

    fn available_endpoints(&self) -> Vec<String> {
        vec![
            self.endpoint("GET", "/health"),
            self.endpoint("GET", "/info"),
            self.endpoint("GET", "/test-connection"),
            self.endpoint("POST", "/query"),
            self.endpoint("POST", "/execute"),
        ]
    }
}

/// HTTP transport serving one [`Gateway`].
pub struct HttpTransport<D: Driver> {
    gateway: Arc<Gateway<D>>,
    host: String,
    port: u16,
    /// Normalized: leading slash, no trailing slash, empty for the root
    base_path: String,
}

impl<D: Driver> HttpTransport<D> {
    pub fn new(
        gateway: Arc<Gateway<D>>,
        host: impl Into<String>,
        port: u16,
        base_path: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            host: host.into(),
            port,
            base_path: crate::config::normalize_base_path(&base_path.into()),
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Build the axum router with every route, the fallback and request logging.
    pub fn router(&self) -> Router {
        let state = AppState {
            gateway: self.gateway.clone(),
            base_path: Arc::from(self.base_path.as_str()),
        };

        let routes = Router::new()
            .route("/query", post(query::<D>))
            .route("/execute", post(execute::<D>))
            .route("/health", get(health))
            .route("/info", get(info_handler::<D>))
            .route("/test-connection", get(test_connection::<D>));

        let app = if self.base_path.is_empty() {
            routes
        } else {
            Router::new().nest(&self.base_path, routes)
        };

        app.fallback(not_found::<D>)
            .layer(middleware::from_fn(log_requests))
            .with_state(state)
    }
}

impl<D: Driver> Transport for HttpTransport<D> {
    async fn run(&self) -> Result<(), ServerError> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;

        info!(
            addr = %bind_addr,
            health = %format!("{}/health", self.base_path),
            "HTTP server listening"
        );

        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(wait_for_signal())
            .await;

        match result {
            Ok(()) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "HTTP server error");
                Err(ServerError::Serve(e))
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Map a body rejection onto the validation failure.
fn statement_body(
    body: Result<Json<StatementBody>, JsonRejection>,
) -> Result<StatementBody, GatewayError> {
    body.map(|Json(body)| body).map_err(|rejection| {
        warn!(reason = %rejection.body_text(), "Rejected request body");
        GatewayError::invalid_body(rejection.body_text())
    })
}

fn statement_response(result: Result<ExecutionOutcome, GatewayError>) -> Response {
    match result {
        Ok(outcome) => Json(format_outcome(&outcome, Utc::now())).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn query<D: Driver>(
    State(state): State<AppState<D>>,
    body: Result<Json<StatementBody>, JsonRejection>,
) -> Response {
    let result = match statement_body(body) {
        Ok(body) => state.gateway.query(body).await,
        Err(e) => Err(e),
    };
    statement_response(result)
}

async fn execute<D: Driver>(
    State(state): State<AppState<D>>,
    body: Result<Json<StatementBody>, JsonRejection>,
) -> Response {
    let result = match statement_body(body) {
        Ok(body) => state.gateway.execute(body).await,
        Err(e) => Err(e),
    };
    statement_response(result)
}

async fn health() -> Response {
    Json(json!({
        "status": "OK",
        "message": "SQL gateway is running",
        "timestamp": timestamp(Utc::now()),
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}

async fn info_handler<D: Driver>(State(state): State<AppState<D>>) -> Response {
    Json(json!({
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.gateway.config().db_type(),
        "endpoints": {
            "health": state.endpoint("GET", "/health"),
            "info": state.endpoint("GET", "/info"),
            "testConnection": state.endpoint("GET", "/test-connection"),
            "query": state.endpoint("POST", "/query"),
            "execute": state.endpoint("POST", "/execute"),
        },
    }))
    .into_response()
}

async fn test_connection<D: Driver>(State(state): State<AppState<D>>) -> Response {
    match state.gateway.test_connection().await {
        Ok(probe) => Json(json!({
            "status": "OK",
            "message": "Database connection established",
            "serverTime": probe.server_time,
            "config": probe.config,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn not_found<D: Driver>(State(state): State<AppState<D>>) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "ERROR",
            "message": "Endpoint not found",
            "availableEndpoints": state.available_endpoints(),
        })),
    )
        .into_response()
}

/// Run each request inside a span with its own id and log how it ended.
async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!(
        "request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path()
    );

    async move {
        let start = Instant::now();
        let response = next.run(request).await;
        info!(
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
        _ = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}
