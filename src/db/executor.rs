//! Statement execution and commit policy.
//!
//! The executor runs one classified statement on one session and decides whether a
//! commit is needed:
//! - READ: fetch all rows, no commit
//! - DDL: execute, no commit (the server commits DDL implicitly)
//! - WRITE: begin, execute, commit; success is reported only after the commit
//!
//! The executor never opens or closes sessions; that belongs to the caller.

use crate::db::driver::Session;
use crate::error::{DbError, GatewayError};
use crate::models::{EntryPoint, ExecutionOutcome, QueryParam, StatementRequest, VerbCategory};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Default number of SQL characters included in log lines.
pub const DEFAULT_SQL_PREVIEW_CHARS: usize = 100;

/// Row count reported for a committed write when the driver gives none.
pub const FALLBACK_ROWS_AFFECTED: u64 = 1;

/// Runs statements and applies the commit policy for their category.
#[derive(Debug, Clone)]
pub struct TransactionExecutor {
    preview_chars: usize,
}

impl TransactionExecutor {
    /// Create a new executor with default settings.
    pub fn new() -> Self {
        Self {
            preview_chars: DEFAULT_SQL_PREVIEW_CHARS,
        }
    }

    /// Number of SQL characters included in log lines.
    pub fn preview_chars(&self) -> usize {
        self.preview_chars
    }

    /// Execute a classified statement on an open session.
    pub async fn run<S: Session>(
        &self,
        session: &mut S,
        request: &StatementRequest,
        category: VerbCategory,
        entry_point: EntryPoint,
    ) -> Result<ExecutionOutcome, GatewayError> {
        let start = Instant::now();
        let sql = request.sql();
        let params = request.params();

        debug!(
            sql = %request.preview(self.preview_chars),
            params = ?params.iter().map(QueryParam::type_name).collect::<Vec<_>>(),
            category = ?category,
            "Executing statement"
        );

        let statement_error =
            |e: DbError| GatewayError::from_statement(e, request.sql(), entry_point);

        match category {
            VerbCategory::Read => {
                let rows = session
                    .fetch_rows(sql, params)
                    .await
                    .map_err(statement_error)?;
                info!(
                    row_count = rows.len(),
                    execution_time_ms = start.elapsed().as_millis() as u64,
                    "Query executed"
                );
                Ok(ExecutionOutcome::rows(rows))
            }
            VerbCategory::Write | VerbCategory::Ddl => {
                let commit = category.requires_commit();
                if commit {
                    session.begin().await.map_err(statement_error)?;
                }
                let reported = session
                    .execute(sql, params)
                    .await
                    .map_err(statement_error)?;

                if !commit {
                    info!(
                        execution_time_ms = start.elapsed().as_millis() as u64,
                        "DDL statement executed (auto-commit)"
                    );
                    return Ok(ExecutionOutcome::Acknowledged);
                }

                if let Err(e) = session.commit().await {
                    warn!(error = %e, "Commit failed; statement result discarded");
                    return Err(GatewayError::from_commit(e));
                }

                let rows_affected = reported.unwrap_or(FALLBACK_ROWS_AFFECTED);
                info!(
                    rows_affected,
                    count_reported = reported.is_some(),
                    execution_time_ms = start.elapsed().as_millis() as u64,
                    "Write statement executed and committed"
                );
                Ok(ExecutionOutcome::Affected { rows_affected })
            }
            VerbCategory::Rejected => Err(GatewayError::internal(
                "rejected statement reached the executor",
            )),
        }
    }
}

impl Default for TransactionExecutor {
    fn default() -> Self {
        Self::new()
    }
}
