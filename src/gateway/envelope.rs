//! Response bodies.
//!
//! Success and failure bodies share one top-level shape: a `status` of `"OK"` or
//! `"ERROR"` followed by category-specific fields.

use crate::error::GatewayError;
use crate::models::ExecutionOutcome;
use axum::Json;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value as JsonValue, json};

/// Message returned for acknowledged and committed statements.
pub const COMMAND_SUCCESS_MESSAGE: &str = "Command executed successfully";

/// RFC 3339 UTC timestamp with millisecond precision, e.g. `2025-01-02T03:04:05.678Z`.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build the success body for an outcome. Total over every variant.
pub fn format_outcome(outcome: &ExecutionOutcome, executed_at: DateTime<Utc>) -> JsonValue {
    let executed_at = timestamp(executed_at);
    match outcome {
        ExecutionOutcome::Rows { rows, row_count } => json!({
            "status": "OK",
            "data": rows,
            "rowCount": row_count,
            "executedAt": executed_at,
        }),
        ExecutionOutcome::Affected { rows_affected } => json!({
            "status": "OK",
            "message": COMMAND_SUCCESS_MESSAGE,
            "affectedRows": rows_affected,
            "executedAt": executed_at,
        }),
        ExecutionOutcome::Acknowledged => json!({
            "status": "OK",
            "message": COMMAND_SUCCESS_MESSAGE,
            "executedAt": executed_at,
        }),
    }
}

/// Build the failure body for an error.
pub fn error_body(error: &GatewayError) -> JsonValue {
    let mut body = json!({
        "status": "ERROR",
        "kind": error.kind().as_str(),
        "message": error.message(),
    });
    if let Some(detail) = error.detail() {
        body["error"] = JsonValue::String(detail.to_string());
    }
    if let Some(context) = error.context() {
        body["context"] = context;
    }
    body
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(error_body(&self))).into_response()
    }
}
