//! Live table analyzer
//!
//! Reads the catalog rows for one table through [`Database`] and builds the
//! same [`TableSchema`] model the parser produces. Nothing is cached: every
//! call goes back to the catalog.

use indexmap::IndexMap;

use crate::db::catalog::{ColumnRow, ForeignKeyRow, IndexRow};
use crate::db::connection::Database;
use crate::error::{Error, Result};
use crate::schema::parser::is_current_timestamp;
use crate::schema::type_map;
use crate::schema::types::{
    ColumnDescriptor, DefaultValue, ForeignKeyDescriptor, IndexDescriptor, IndexKind,
    ReferentialAction, TableSchema,
};

/// Schema analyzer for live table introspection
pub struct SchemaAnalyzer<'a> {
    db: &'a dyn Database,
}

impl<'a> SchemaAnalyzer<'a> {
    /// Create a new schema analyzer
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Introspect a table into the structural model
    pub async fn analyze_table(&self, table: &str) -> Result<TableSchema> {
        let column_rows = self.db.column_rows(table).await.map_err(|e| as_introspection(table, e))?;
        if column_rows.is_empty() {
            return Err(Error::introspection(table, "table has no columns or does not exist"));
        }
        let index_rows = self.db.index_rows(table).await.map_err(|e| as_introspection(table, e))?;

        let mut schema = TableSchema::new(table);
        schema.columns = column_rows.iter().map(column_from_row).collect();
        schema.indexes = group_indexes(&index_rows);
        schema.foreign_keys = self.foreign_keys(table).await?;
        schema.has_timestamps = schema.has_column("created_at") && schema.has_column("updated_at");
        if schema.has_column("deleted_at") {
            schema.has_soft_deletes = true;
            schema.soft_deletes_column = Some("deleted_at".to_string());
        }

        tracing::debug!(
            table,
            columns = schema.columns.len(),
            indexes = schema.indexes.len(),
            foreign_keys = schema.foreign_keys.len(),
            "Analyzed live table"
        );

        Ok(schema)
    }

    /// Foreign keys owned by the table
    pub async fn foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescriptor>> {
        let rows = self
            .db
            .foreign_key_rows(table)
            .await
            .map_err(|e| as_introspection(table, e))?;
        Ok(group_foreign_keys(&rows))
    }

    /// Foreign keys in other tables that reference the table
    pub async fn referencing_foreign_keys(&self, table: &str) -> Result<Vec<ForeignKeyDescriptor>> {
        let rows = self
            .db
            .referencing_foreign_key_rows(table)
            .await
            .map_err(|e| as_introspection(table, e))?;
        Ok(group_foreign_keys(&rows))
    }
}

fn as_introspection(table: &str, error: Error) -> Error {
    match error {
        Error::Introspection { .. } => error,
        other => Error::introspection(table, other.to_string()),
    }
}

/// Build a column descriptor from a catalog row
pub fn column_from_row(row: &ColumnRow) -> ColumnDescriptor {
    let (column_type, params, unsigned) = type_map::from_native(&row.column_type);

    let mut column = ColumnDescriptor::new(&row.column_name, column_type);
    column.params = params;
    column.unsigned = unsigned;
    column.nullable = row.is_nullable.eq_ignore_ascii_case("YES");
    column.default = row.column_default.as_deref().and_then(parse_catalog_default);
    column.comment = Some(row.column_comment.clone()).filter(|c| !c.is_empty());
    column.auto_increment = row.extra.to_lowercase().contains("auto_increment");
    column.primary_key = row.column_key.eq_ignore_ascii_case("PRI");
    column.native = Some(row.column_type.clone());
    column
}

/// Interpret a catalog default expression
///
/// MySQL reports string defaults unquoted, MariaDB quoted; both are accepted.
pub fn parse_catalog_default(raw: &str) -> Option<DefaultValue> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("NULL") {
        return None;
    }
    if is_current_timestamp(trimmed) {
        return Some(DefaultValue::CurrentTimestamp);
    }
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        let inner = &trimmed[1..trimmed.len() - 1];
        return Some(DefaultValue::Text(inner.replace("''", "'").replace("\\\\", "\\")));
    }
    if !trimmed.is_empty() && trimmed.parse::<f64>().is_ok() {
        return Some(DefaultValue::Number(trimmed.to_string()));
    }
    Some(DefaultValue::Text(raw.to_string()))
}

/// Group index rows into descriptors, skipping the primary key
pub fn group_indexes(rows: &[IndexRow]) -> Vec<IndexDescriptor> {
    let mut grouped: IndexMap<String, (IndexKind, Vec<(i64, String)>)> = IndexMap::new();

    for row in rows {
        if row.index_name.eq_ignore_ascii_case("PRIMARY") {
            continue;
        }
        let kind = if row.index_type.eq_ignore_ascii_case("SPATIAL") {
            IndexKind::Spatial
        } else if row.non_unique == 0 {
            IndexKind::Unique
        } else {
            IndexKind::Normal
        };
        grouped
            .entry(row.index_name.clone())
            .or_insert_with(|| (kind, Vec::new()))
            .1
            .push((row.seq_in_index, row.column_name.clone()));
    }

    grouped
        .into_iter()
        .map(|(name, (kind, mut columns))| {
            columns.sort_by_key(|(seq, _)| *seq);
            IndexDescriptor::new(&name, kind, columns.into_iter().map(|(_, c)| c).collect())
        })
        .collect()
}

/// Group foreign key rows by constraint; only the first column is modelled
pub fn group_foreign_keys(rows: &[ForeignKeyRow]) -> Vec<ForeignKeyDescriptor> {
    let mut grouped: IndexMap<(String, String), ForeignKeyDescriptor> = IndexMap::new();

    for row in rows {
        grouped
            .entry((row.table_name.clone(), row.constraint_name.clone()))
            .or_insert_with(|| ForeignKeyDescriptor {
                name: row.constraint_name.clone(),
                table: row.table_name.clone(),
                column: row.column_name.clone(),
                referenced_table: row.referenced_table.clone(),
                referenced_column: row.referenced_column.clone(),
                on_delete: ReferentialAction::parse(&row.delete_rule),
                on_update: ReferentialAction::parse(&row.update_rule),
            });
    }

    grouped.into_values().collect()
}
