//! SQL Gateway Library
//!
//! An HTTP gateway that runs client-supplied SQL against one relational database
//! (PostgreSQL, MySQL, SQLite). Statements are allow-listed by their leading verb,
//! each request uses its own connection, and data-changing statements are committed
//! before success is reported.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod transport;

pub use config::Config;
pub use error::{DbError, GatewayError};
pub use gateway::Gateway;
