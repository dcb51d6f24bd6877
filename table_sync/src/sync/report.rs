//! Per-table outcomes and the run summary

use serde::Serialize;
use std::time::Duration;

use crate::schema::diff::ChangeSet;
use crate::schema::risk::Strategy;

/// What happened to one table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TableOutcome {
    /// Live table already matches its definition
    Unchanged,
    Updated { strategy: Strategy },
    /// Direct path where some statements failed
    PartiallyUpdated { completed: usize, attempted: usize },
    /// Dry run: statements were logged, not applied
    Planned { strategy: Strategy, statements: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl TableOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, TableOutcome::PartiallyUpdated { .. } | TableOutcome::Failed { .. })
    }

    /// Whether the change set reached the database
    pub fn is_applied(&self) -> bool {
        matches!(self, TableOutcome::Updated { .. } | TableOutcome::PartiallyUpdated { .. })
    }
}

/// Per-table line of the summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub table: String,
    pub outcome: TableOutcome,
    pub columns_added: usize,
    pub columns_modified: usize,
    pub columns_dropped: usize,
}

impl TableReport {
    pub fn new(table: &str, outcome: TableOutcome) -> Self {
        Self {
            table: table.to_string(),
            outcome,
            columns_added: 0,
            columns_modified: 0,
            columns_dropped: 0,
        }
    }

    pub fn with_changes(mut self, change_set: &ChangeSet) -> Self {
        self.columns_added = change_set.add_columns.len();
        self.columns_modified = change_set.modify_columns.len();
        self.columns_dropped = change_set.drop_columns.len();
        self
    }
}

/// Totals for a synchronization run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    pub tables_processed: usize,
    pub tables_updated: usize,
    pub columns_added: usize,
    pub columns_modified: usize,
    pub columns_dropped: usize,
    pub errors: usize,
    pub elapsed_ms: u128,
    pub tables: Vec<TableReport>,
}

impl SyncSummary {
    /// Add a table's report; skipped tables caused by an error count as errors
    pub fn record(&mut self, report: TableReport, skipped_on_error: bool) {
        self.tables_processed += 1;
        if report.outcome.is_applied() {
            self.tables_updated += 1;
            self.columns_added += report.columns_added;
            self.columns_modified += report.columns_modified;
            self.columns_dropped += report.columns_dropped;
        }
        if report.outcome.is_error() || skipped_on_error {
            self.errors += 1;
        }
        self.tables.push(report);
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed_ms = elapsed.as_millis();
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn outcome(&self, table: &str) -> Option<&TableOutcome> {
        self.tables.iter().find(|r| r.table == table).map(|r| &r.outcome)
    }

    /// Log the totals and every table that was not left unchanged
    pub fn log(&self) {
        for report in &self.tables {
            match &report.outcome {
                TableOutcome::Unchanged => {}
                TableOutcome::Failed { error } => {
                    tracing::error!(table = %report.table, error = %error, "Table failed")
                }
                outcome => tracing::info!(table = %report.table, outcome = ?outcome, "Table result"),
            }
        }
        tracing::info!(
            tables_processed = self.tables_processed,
            tables_updated = self.tables_updated,
            columns_added = self.columns_added,
            columns_modified = self.columns_modified,
            columns_dropped = self.columns_dropped,
            errors = self.errors,
            elapsed_ms = self.elapsed_ms as u64,
            "Synchronization finished"
        );
    }
}
