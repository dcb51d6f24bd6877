//! Foreign-key guardian
//!
//! Captures, drops and re-creates foreign keys around destructive structural
//! steps. Every drop and restore re-checks the catalog first so a constraint
//! that already vanished (or already came back) is not touched twice.

use serde::Serialize;

use crate::db::connection::Database;
use crate::db::statement::Statement;
use crate::error::Result;
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::types::ForeignKeyDescriptor;

/// Foreign keys touching one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignKeySnapshot {
    pub table: String,
    /// Constraints declared on the table itself
    pub owned: Vec<ForeignKeyDescriptor>,
    /// Constraints in other tables pointing at the table
    pub referencing: Vec<ForeignKeyDescriptor>,
}

/// Outcome of re-creating a set of foreign keys
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl RestoreReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct ForeignKeyGuardian<'a> {
    db: &'a dyn Database,
}

impl<'a> ForeignKeyGuardian<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Record owned and referencing foreign keys of a table
    pub async fn snapshot(&self, table: &str) -> Result<ForeignKeySnapshot> {
        let analyzer = SchemaAnalyzer::new(self.db);
        let snapshot = ForeignKeySnapshot {
            table: table.to_string(),
            owned: analyzer.foreign_keys(table).await?,
            referencing: analyzer.referencing_foreign_keys(table).await?,
        };

        tracing::debug!(
            table,
            owned = snapshot.owned.len(),
            referencing = snapshot.referencing.len(),
            "Captured foreign key snapshot"
        );

        Ok(snapshot)
    }

    async fn exists(&self, fk: &ForeignKeyDescriptor) -> Result<bool> {
        let rows = self.db.foreign_key_rows(&fk.table).await?;
        Ok(rows.iter().any(|row| row.constraint_name == fk.name))
    }

    /// Drop one constraint if it still exists; `false` when it was already gone
    pub async fn drop_foreign_key(&self, fk: &ForeignKeyDescriptor, reason: &str) -> Result<bool> {
        if !self.exists(fk).await? {
            tracing::debug!(table = %fk.table, constraint = %fk.name, "Foreign key already gone");
            return Ok(false);
        }

        tracing::info!(table = %fk.table, constraint = %fk.name, reason, "Dropping foreign key");
        self.db
            .execute(&Statement::DropForeignKey {
                table: fk.table.clone(),
                name: fk.name.clone(),
            })
            .await?;
        Ok(true)
    }

    /// Drop the referencing constraints, returning the ones actually dropped
    pub async fn drop_referencing(&self, snapshot: &ForeignKeySnapshot) -> Result<Vec<ForeignKeyDescriptor>> {
        let mut dropped = Vec::new();
        for fk in &snapshot.referencing {
            let reason = format!("references {} which is being rebuilt", snapshot.table);
            if self.drop_foreign_key(fk, &reason).await? {
                dropped.push(fk.clone());
            }
        }
        Ok(dropped)
    }

    /// Drop owned and referencing constraints
    pub async fn drop_all(&self, snapshot: &ForeignKeySnapshot) -> Result<Vec<ForeignKeyDescriptor>> {
        let mut dropped = Vec::new();
        for fk in &snapshot.owned {
            if self.drop_foreign_key(fk, "structural change on owning table").await? {
                dropped.push(fk.clone());
            }
        }
        dropped.extend(self.drop_referencing(snapshot).await?);
        Ok(dropped)
    }

    /// Re-create constraints touching `table`, given its current columns
    ///
    /// A constraint is skipped when its column on `table` no longer exists,
    /// or when a constraint of the same name is already present. Failures are
    /// logged and reported, never raised.
    pub async fn restore(&self, table: &str, fks: &[ForeignKeyDescriptor], columns: &[String]) -> RestoreReport {
        let mut report = RestoreReport::default();

        for fk in fks {
            let missing_column = if fk.table == table {
                Some(&fk.column).filter(|c| !columns.contains(*c))
            } else if fk.referenced_table == table {
                Some(&fk.referenced_column).filter(|c| !columns.contains(*c))
            } else {
                None
            };
            if let Some(column) = missing_column {
                tracing::warn!(
                    table = %fk.table,
                    constraint = %fk.name,
                    column = %column,
                    "Not restoring foreign key: column was removed"
                );
                report.skipped.push(fk.name.clone());
                continue;
            }

            match self.exists(fk).await {
                Ok(true) => {
                    tracing::debug!(table = %fk.table, constraint = %fk.name, "Foreign key already present");
                    report.skipped.push(fk.name.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(table = %fk.table, constraint = %fk.name, error = %e, "Could not check foreign key");
                    report.failed.push(fk.name.clone());
                    continue;
                }
            }

            let statement = Statement::AddForeignKey {
                table: fk.table.clone(),
                foreign_key: fk.clone(),
            };
            match self.db.execute(&statement).await {
                Ok(_) => {
                    tracing::info!(table = %fk.table, constraint = %fk.name, "Restored foreign key");
                    report.restored.push(fk.name.clone());
                }
                Err(e) => {
                    tracing::error!(table = %fk.table, constraint = %fk.name, error = %e, "Failed to restore foreign key");
                    report.failed.push(fk.name.clone());
                }
            }
        }

        report
    }
}
