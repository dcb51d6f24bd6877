//! Raw catalog rows
//!
//! Shapes of the `information_schema` rows the introspector consumes. Column
//! names are lowercase aliases so the rows derive `FromRow` directly.

use sqlx::FromRow;

/// One row of `information_schema.COLUMNS`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ColumnRow {
    pub column_name: String,
    /// Full column type, e.g. `varchar(255)` or `bigint(20) unsigned`
    pub column_type: String,
    /// `YES` or `NO`
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub column_comment: String,
    /// `PRI`, `UNI`, `MUL` or empty
    pub column_key: String,
    /// e.g. `auto_increment`
    pub extra: String,
}

/// One row of `information_schema.STATISTICS`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IndexRow {
    pub index_name: String,
    pub column_name: String,
    pub non_unique: i64,
    pub seq_in_index: i64,
    /// `BTREE`, `HASH`, `SPATIAL` or `FULLTEXT`
    pub index_type: String,
}

/// One column of a foreign key constraint joined with its referential rules
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ForeignKeyRow {
    pub constraint_name: String,
    pub table_name: String,
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub delete_rule: String,
    pub update_rule: String,
}
