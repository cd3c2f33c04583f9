//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Driver and session traits
//! - Request-scoped connection management
//! - Statement execution with commit policy
//! - Native sqlx sessions and row decoding

pub mod connection;
pub mod driver;
pub mod executor;
pub mod rows;
pub mod sqlx_driver;

pub use connection::{ConnectionGuard, ConnectionManager};
pub use driver::{Driver, Session};
pub use executor::TransactionExecutor;
pub use sqlx_driver::{SqlxDriver, SqlxSession};
