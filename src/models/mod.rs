//! Data models for the SQL gateway.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod statement;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, ConnectionParams, ConnectionSummary, DatabaseType,
};
pub use statement::{
    EntryPoint, ExecutionOutcome, QueryParam, Row, StatementBody, StatementRequest, VerbCategory,
};
