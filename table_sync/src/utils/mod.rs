//! Utilities for table_sync
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{
    backup_table_name, clone_table_name, format_name, generate_index_name, get_foreign_key_name,
    quote_ident, ProtectedColumns,
};
