//! Database module for table_sync
//!
//! This module handles the connection, catalog rows and typed statements.

pub mod catalog;
pub mod connection;
pub mod executor;
pub mod statement;

// Re-export key types
pub use connection::{Database, DatabaseConnection};
pub use executor::{BatchOutcome, StatementExecutor};
pub use statement::{ColumnDefinition, CopyColumn, CopyRows, Statement};
