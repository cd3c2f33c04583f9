//! Request-scoped connection management.
//!
//! Every request gets its own session from [`ConnectionManager::acquire`] and gives it
//! back through [`ConnectionGuard::release`]. Nothing is pooled or cached between
//! requests. If a guard is dropped without being released (a cancelled future, a
//! panic outside statement execution), the session is detached in the background so
//! it can never leak. That detach may finish after the response has been sent.

use crate::db::driver::{Driver, Session};
use crate::error::DbResult;
use std::time::Instant;
use tracing::{debug, warn};

/// Opens one session per request on top of a [`Driver`].
#[derive(Debug)]
pub struct ConnectionManager<D> {
    driver: D,
}

impl<D: Driver> ConnectionManager<D> {
    /// Create a new connection manager.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    /// Open a dedicated session for the current request.
    pub async fn acquire(&self) -> DbResult<ConnectionGuard<D::Session>> {
        let start = Instant::now();
        let session = self.driver.attach().await?;
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Database session attached"
        );
        Ok(ConnectionGuard::new(session))
    }
}

/// Guard for a request-scoped session.
///
/// The session is detached exactly once: either by an explicit [`release`] or, as a
/// fallback, when the guard is dropped.
///
/// [`release`]: ConnectionGuard::release
pub struct ConnectionGuard<S: Session> {
    session: Option<S>,
    attached_at: Instant,
}

impl<S: Session> std::fmt::Debug for ConnectionGuard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionGuard")
            .field("released", &self.session.is_none())
            .field("held_ms", &self.attached_at.elapsed().as_millis())
            .finish_non_exhaustive()
    }
}

impl<S: Session> ConnectionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session: Some(session),
            attached_at: Instant::now(),
        }
    }

    /// Get the session for running statements.
    pub fn session(&mut self) -> &mut S {
        // Only `release` and `drop` take the session, and both consume the guard.
        match self.session.as_mut() {
            Some(session) => session,
            None => unreachable!("session taken from a live guard"),
        }
    }

    /// Explicitly detach the session (preferred over relying on Drop).
    ///
    /// A failure to detach is logged and swallowed: the request outcome is already
    /// decided, and the server drops the session when the socket closes.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            let held_ms = self.attached_at.elapsed().as_millis() as u64;
            match session.detach().await {
                Ok(()) => debug!(held_ms, "Database session released"),
                Err(e) => warn!(held_ms, error = %e, "Failed to detach database session"),
            }
        }
    }
}

impl<S: Session> Drop for ConnectionGuard<S> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        // Drop cannot await; detach on the runtime instead.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.detach().await {
                        warn!(error = %e, "Failed to detach database session");
                    }
                    warn!("Session released via Drop - consider using explicit release()");
                });
            }
            Err(_) => {
                warn!("No async runtime available; dropping database session without detach");
                drop(session);
            }
        }
    }
}
