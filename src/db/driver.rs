//! Driver abstraction.
//!
//! The gateway only needs four things from a database driver: open a session,
//! run a statement on it, commit, and close it. [`Driver`] and [`Session`] capture
//! exactly that, so the pipeline can be exercised without a live server.

use crate::error::DbResult;
use crate::models::{QueryParam, Row};
use std::future::Future;

/// Opens sessions against one configured database.
pub trait Driver: Send + Sync + 'static {
    type Session: Session;

    /// Open a new, dedicated session. Sessions are never reused.
    fn attach(&self) -> impl Future<Output = DbResult<Self::Session>> + Send;
}

/// A single open database session, owned by one request.
pub trait Session: Send + 'static {
    /// Run a statement and return every row it produced.
    fn fetch_rows(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Vec<Row>>> + Send;

    /// Run a statement for its side effects.
    ///
    /// Returns the affected-row count, or `None` when the driver cannot report one.
    fn execute(
        &mut self,
        sql: &str,
        params: &[QueryParam],
    ) -> impl Future<Output = DbResult<Option<u64>>> + Send;

    /// Start an explicit transaction; statements until [`Session::commit`] are not persisted.
    fn begin(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Commit the transaction opened by [`Session::begin`].
    fn commit(&mut self) -> impl Future<Output = DbResult<()>> + Send;

    /// Close the session. Uncommitted work is discarded by the server.
    fn detach(self) -> impl Future<Output = DbResult<()>> + Send;
}
