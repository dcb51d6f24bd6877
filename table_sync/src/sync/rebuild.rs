//! Safe rebuild executor
//!
//! Applies a risky change set to a structural clone, copies the rows across in
//! batches, swaps the clone in with one atomic `RENAME TABLE`, verifies the row
//! count and only then discards the original.
//!
//! ```text
//! Start -> TempCreated -> StructureApplied -> DataCopied -> Swapped -> Verified -> Committed
//!                                                                   \-> RolledBack
//! ```
//!
//! Failures before the swap drop the clone; failures after it put the backup
//! back under the original name. Referencing foreign keys are restored on
//! both paths.

use serde::Serialize;
use std::fmt;

use crate::db::connection::Database;
use crate::db::executor::StatementExecutor;
use crate::db::statement::{CopyColumn, CopyRows, Statement};
use crate::error::{Error, Result};
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::diff::ChangeSet;
use crate::schema::type_map::TypeMapper;
use crate::schema::types::{AbstractType, ColumnDescriptor, ForeignKeyDescriptor, TableSchema, TypeParams};
use crate::sync::direct;
use crate::sync::guardian::{ForeignKeyGuardian, ForeignKeySnapshot, RestoreReport};
use crate::utils::naming::{backup_table_name, clone_table_name, quote_literal};

/// Checkpoints of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RebuildState {
    Start,
    TempCreated,
    StructureApplied,
    DataCopied,
    Swapped,
    Verified,
    Committed,
    RolledBack,
}

impl fmt::Display for RebuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RebuildOptions {
    pub batch_size: u64,
    /// Accept a row-count mismatch instead of rolling back
    pub force: bool,
}

impl Default for RebuildOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            force: false,
        }
    }
}

/// Summary of a committed rebuild
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RebuildReport {
    pub table: String,
    pub original_rows: u64,
    pub final_rows: u64,
    pub rows_copied: u64,
    pub state: RebuildState,
    pub foreign_keys: RestoreReport,
}

pub struct SafeRebuild<'a> {
    db: &'a dyn Database,
    mapper: &'a TypeMapper,
    options: RebuildOptions,
}

impl<'a> SafeRebuild<'a> {
    pub fn new(db: &'a dyn Database, mapper: &'a TypeMapper, options: RebuildOptions) -> Self {
        Self { db, mapper, options }
    }

    fn transition(&self, table: &str, state: &mut RebuildState, next: RebuildState) {
        tracing::info!(table, from = %state, to = %next, "Rebuild state change");
        *state = next;
    }

    /// Rebuild `actual` with `change_set` applied
    pub async fn run(&self, actual: &TableSchema, change_set: &ChangeSet) -> Result<RebuildReport> {
        let table = actual.name.as_str();
        let guardian = ForeignKeyGuardian::new(self.db);
        let executor = StatementExecutor::new(self.db);
        let mut state = RebuildState::Start;

        let snapshot = guardian.snapshot(table).await?;
        let original_rows = self.db.count_rows(table).await?;
        tracing::info!(table, rows = original_rows, "Starting safe rebuild");

        if let Err(e) = guardian.drop_referencing(&snapshot).await {
            self.restore_referencing(&guardian, &snapshot, actual).await;
            return Err(Error::rebuild(table, format!("could not release referencing foreign keys: {}", e)));
        }

        let clone = clone_table_name(table);
        let create = Statement::CreateTableLike {
            table: clone.clone(),
            source: table.to_string(),
        };
        if let Err(e) = executor.execute(&create).await {
            self.restore_referencing(&guardian, &snapshot, actual).await;
            return Err(Error::rebuild(table, format!("could not create clone {}: {}", clone, e)));
        }
        self.transition(table, &mut state, RebuildState::TempCreated);

        let rows_copied = match self.prepare_clone(&executor, actual, change_set, &clone, original_rows, &mut state).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(table, clone = %clone, error = %e, "Rebuild failed before swap, dropping clone");
                self.drop_quietly(&executor, &clone).await;
                self.restore_referencing(&guardian, &snapshot, actual).await;
                self.transition(table, &mut state, RebuildState::RolledBack);
                return Err(Error::rebuild(table, e.to_string()));
            }
        };

        let backup = backup_table_name(table);
        let swap = Statement::RenameTables(vec![
            (table.to_string(), backup.clone()),
            (clone.clone(), table.to_string()),
        ]);
        if let Err(e) = executor.execute(&swap).await {
            self.drop_quietly(&executor, &clone).await;
            self.restore_referencing(&guardian, &snapshot, actual).await;
            self.transition(table, &mut state, RebuildState::RolledBack);
            return Err(Error::rebuild(table, format!("swap failed: {}", e)));
        }
        self.transition(table, &mut state, RebuildState::Swapped);

        let final_rows = match self.verify(table, &backup).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(table, backup = %backup, error = %e, "Verification failed, restoring original table");
                self.roll_back_swap(&executor, table, &backup).await;
                self.restore_referencing(&guardian, &snapshot, actual).await;
                self.transition(table, &mut state, RebuildState::RolledBack);
                return Err(Error::rebuild(table, e.to_string()));
            }
        };
        self.transition(table, &mut state, RebuildState::Verified);

        // owned constraints live on the backup until it is gone
        tracing::info!(table, backup = %backup, "Dropping backup table");
        if let Err(e) = executor.execute(&Statement::DropTable { table: backup.clone() }).await {
            tracing::warn!(table, backup = %backup, error = %e, "Could not drop backup table");
        }

        let columns: Vec<String> = match SchemaAnalyzer::new(self.db).analyze_table(table).await {
            Ok(schema) => schema.columns.into_iter().map(|c| c.name).collect(),
            Err(e) => {
                tracing::warn!(table, error = %e, "Could not read rebuilt columns, using the planned column list");
                columns_after(actual, change_set)
            }
        };
        let foreign_keys = guardian
            .restore(table, &foreign_keys_after(&snapshot, change_set), &columns)
            .await;
        self.transition(table, &mut state, RebuildState::Committed);

        Ok(RebuildReport {
            table: table.to_string(),
            original_rows,
            final_rows,
            rows_copied,
            state,
            foreign_keys,
        })
    }

    /// Apply the structure change to the clone and copy rows into it
    async fn prepare_clone(
        &self,
        executor: &StatementExecutor<'_>,
        actual: &TableSchema,
        change_set: &ChangeSet,
        clone: &str,
        original_rows: u64,
        state: &mut RebuildState,
    ) -> Result<u64> {
        let has_primary_key = !actual.primary_key().is_empty();
        let structure: Vec<Statement> = direct::plan(clone, change_set, &[], self.mapper, has_primary_key)
            .into_iter()
            .filter(|statement| !statement.is_foreign_key())
            .collect();
        executor.execute_batch(&structure).await?;
        self.transition(&actual.name, state, RebuildState::StructureApplied);

        let target = SchemaAnalyzer::new(self.db).analyze_table(clone).await?;
        let columns: Vec<CopyColumn> = target
            .columns
            .iter()
            .filter(|column| actual.has_column(&column.name))
            .map(|column| CopyColumn {
                name: column.name.clone(),
                placeholder: needs_placeholder(column).then(|| placeholder(column)),
            })
            .collect();
        if columns.is_empty() {
            return Err(Error::rebuild(&actual.name, "no columns in common with the clone"));
        }

        let order_by = actual.primary_key();
        let mut rows_copied = 0;
        if order_by.is_empty() {
            tracing::warn!(table = %actual.name, "No primary key, copying rows in a single statement");
            rows_copied += executor
                .execute(&Statement::CopyRows(CopyRows {
                    source: actual.name.clone(),
                    target: clone.to_string(),
                    columns,
                    order_by,
                    limit: None,
                    offset: 0,
                }))
                .await?;
        } else {
            // rows inserted while copying land past the first count
            let batch_size = self.options.batch_size.max(1);
            let mut offset = 0;
            loop {
                let copied = executor
                    .execute(&Statement::CopyRows(CopyRows {
                        source: actual.name.clone(),
                        target: clone.to_string(),
                        columns: columns.clone(),
                        order_by: order_by.clone(),
                        limit: Some(batch_size),
                        offset,
                    }))
                    .await?;
                rows_copied += copied;
                offset += batch_size;
                tracing::debug!(table = %actual.name, copied = rows_copied, total = original_rows, "Copied batch");
                if offset >= original_rows && copied < batch_size {
                    break;
                }
            }
        }
        self.transition(&actual.name, state, RebuildState::DataCopied);

        Ok(rows_copied)
    }

    /// Compare the swapped-in table against the backup it replaced
    async fn verify(&self, table: &str, backup: &str) -> Result<u64> {
        let expected = self.db.count_rows(backup).await?;
        let actual = self.db.count_rows(table).await?;
        if actual == expected {
            return Ok(actual);
        }
        if self.options.force {
            tracing::warn!(table, expected, actual, "Forced: accepting row count mismatch");
            return Ok(actual);
        }
        Err(Error::IntegrityCheck {
            table: table.to_string(),
            expected,
            actual,
        })
    }

    async fn roll_back_swap(&self, executor: &StatementExecutor<'_>, table: &str, backup: &str) {
        self.drop_quietly(executor, table).await;
        let restore = Statement::RenameTables(vec![(backup.to_string(), table.to_string())]);
        if let Err(e) = executor.execute(&restore).await {
            tracing::error!(table, backup, error = %e, "Could not rename backup back; original data remains in backup table");
        }
    }

    async fn drop_quietly(&self, executor: &StatementExecutor<'_>, table: &str) {
        if let Err(e) = executor.execute(&Statement::DropTable { table: table.to_string() }).await {
            tracing::error!(table, error = %e, "Could not drop table");
        }
    }

    async fn restore_referencing(&self, guardian: &ForeignKeyGuardian<'_>, snapshot: &ForeignKeySnapshot, actual: &TableSchema) {
        if snapshot.referencing.is_empty() {
            return;
        }
        let columns: Vec<String> = actual.columns.iter().map(|c| c.name.clone()).collect();
        let report = guardian.restore(&actual.name, &snapshot.referencing, &columns).await;
        if !report.is_clean() {
            tracing::error!(table = %actual.name, failed = ?report.failed, "Some referencing foreign keys could not be restored");
        }
    }
}

/// Constraints that should exist once the rebuilt table is in place
///
/// Owned keys survive unless the change set drops or replaces them; declared
/// additions and referencing keys are added on top.
pub fn foreign_keys_after(snapshot: &ForeignKeySnapshot, change_set: &ChangeSet) -> Vec<ForeignKeyDescriptor> {
    let mut fks: Vec<ForeignKeyDescriptor> = snapshot
        .owned
        .iter()
        .filter(|fk| !change_set.drop_foreign_keys.iter().any(|dropped| dropped.name == fk.name))
        .filter(|fk| !change_set.add_foreign_keys.iter().any(|added| added.name == fk.name))
        .cloned()
        .collect();

    for added in &change_set.add_foreign_keys {
        let mut fk = added.clone();
        fk.table = snapshot.table.clone();
        fks.push(fk);
    }

    fks.extend(snapshot.referencing.iter().cloned());
    fks
}

/// Column names the rebuilt table is planned to have
pub fn columns_after(actual: &TableSchema, change_set: &ChangeSet) -> Vec<String> {
    actual
        .columns
        .iter()
        .map(|c| c.name.clone())
        .filter(|name| !change_set.drop_columns.contains(name))
        .chain(change_set.add_columns.iter().map(|c| c.name.clone()))
        .collect()
}

fn needs_placeholder(column: &ColumnDescriptor) -> bool {
    !column.nullable && column.default.is_none() && !column.auto_increment
}

/// Literal that satisfies a NOT NULL column without a default
pub fn placeholder(column: &ColumnDescriptor) -> String {
    match &column.column_type {
        t if t.is_numeric() => "0".to_string(),
        AbstractType::Date => "'1970-01-01'".to_string(),
        AbstractType::DateTime => "'1970-01-01 00:00:00'".to_string(),
        // earliest value a TIMESTAMP accepts
        AbstractType::Timestamp => "'1970-01-01 00:00:01'".to_string(),
        AbstractType::Time => "'00:00:00'".to_string(),
        AbstractType::Year => "1970".to_string(),
        AbstractType::Json => "'{}'".to_string(),
        AbstractType::Enum | AbstractType::Set => match &column.params {
            TypeParams::Values(values) if !values.is_empty() => quote_literal(&values[0]),
            _ => "''".to_string(),
        },
        _ => "''".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::ReferentialAction;
    use rstest::rstest;

    #[rstest]
    #[case(AbstractType::Integer, TypeParams::None, "0")]
    #[case(AbstractType::Decimal, TypeParams::Precision { precision: 8, scale: 2 }, "0")]
    #[case(AbstractType::String, TypeParams::Length(20), "''")]
    #[case(AbstractType::Date, TypeParams::None, "'1970-01-01'")]
    #[case(AbstractType::Timestamp, TypeParams::None, "'1970-01-01 00:00:01'")]
    #[case(AbstractType::Json, TypeParams::None, "'{}'")]
    #[case(AbstractType::Enum, TypeParams::Values(vec!["draft".to_string(), "live".to_string()]), "'draft'")]
    fn test_placeholder(#[case] column_type: AbstractType, #[case] params: TypeParams, #[case] expected: &str) {
        let column = ColumnDescriptor::new("c", column_type).params(params);
        assert_eq!(placeholder(&column), expected);
    }

    #[test]
    fn test_placeholder_only_for_required_columns() {
        let required = ColumnDescriptor::new("sku", AbstractType::String);
        let optional = ColumnDescriptor::new("note", AbstractType::String).nullable(true);
        let mut serial = ColumnDescriptor::new("id", AbstractType::BigInteger);
        serial.auto_increment = true;

        assert!(needs_placeholder(&required));
        assert!(!needs_placeholder(&optional));
        assert!(!needs_placeholder(&serial));
    }

    #[test]
    fn test_columns_after_rebuild() {
        let mut actual = TableSchema::new("products");
        for name in ["id", "legacy_code", "name"] {
            actual.add_column(ColumnDescriptor::new(name, AbstractType::String));
        }
        let mut change_set = ChangeSet::new("products");
        change_set.drop_columns.push("legacy_code".to_string());
        change_set.add_columns.push(ColumnDescriptor::new("sku", AbstractType::String));

        assert_eq!(
            columns_after(&actual, &change_set),
            vec!["id".to_string(), "name".to_string(), "sku".to_string()]
        );
    }

    #[test]
    fn test_foreign_keys_after_rebuild() {
        let fk = |table: &str, column: &str, referenced: &str| ForeignKeyDescriptor {
            name: format!("{}_{}_foreign", table, column),
            table: table.to_string(),
            column: column.to_string(),
            referenced_table: referenced.to_string(),
            referenced_column: "id".to_string(),
            on_delete: ReferentialAction::Restrict,
            on_update: ReferentialAction::Restrict,
        };
        let snapshot = ForeignKeySnapshot {
            table: "products".to_string(),
            owned: vec![fk("products", "category_id", "categories"), fk("products", "brand_id", "brands")],
            referencing: vec![fk("order_items", "product_id", "products")],
        };
        let mut change_set = ChangeSet::new("products");
        change_set.drop_foreign_keys.push(fk("products", "brand_id", "brands"));
        change_set.add_foreign_keys.push(fk("products", "vendor_id", "vendors"));

        let names: Vec<String> = foreign_keys_after(&snapshot, &change_set)
            .into_iter()
            .map(|fk| fk.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "products_category_id_foreign".to_string(),
                "products_vendor_id_foreign".to_string(),
                "order_items_product_id_foreign".to_string(),
            ]
        );
    }
}
