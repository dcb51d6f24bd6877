//! Schema module for table_sync
//!
//! This module handles parsing definitions, reading live tables, and comparing the two.

pub mod analyzer;
pub mod diff;
pub mod lexer;
pub mod parser;
pub mod risk;
pub mod type_map;
pub mod types;

// Re-export key types
pub use analyzer::SchemaAnalyzer;
pub use diff::{diff, ChangeField, ChangeReason, ChangeSet, ColumnChange, DiffContext};
pub use parser::{parse_definition, parse_table, to_definition, ParsedDefinition};
pub use risk::{classify, Strategy};
pub use type_map::TypeMapper;
pub use types::{
    AbstractType, ColumnDescriptor, DefaultValue, ForeignKeyDescriptor, IndexDescriptor, IndexKind,
    ReferentialAction, TableSchema, TypeParams,
};
