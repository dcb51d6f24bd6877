//! Synchronization of live tables with their definitions
//!
//! Tables are processed one at a time. A failure is contained to its table:
//! it is logged, recorded in the summary and the run moves on.

pub mod direct;
pub mod guardian;
pub mod rebuild;
pub mod report;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Instrument;
use walkdir::WalkDir;

use crate::config::{SyncConfig, TypeMappingConfig};
use crate::db::connection::Database;
use crate::db::executor::StatementExecutor;
use crate::error::{Error, Result};
use crate::schema::analyzer::SchemaAnalyzer;
use crate::schema::diff::{diff, ChangeSet, DiffContext};
use crate::schema::parser::{extract_block, parse_definition};
use crate::schema::risk::{assess, Strategy};
use crate::schema::type_map::TypeMapper;
use crate::utils::naming::{table_name_from_file_stem, ProtectedColumns};

pub use direct::DirectExecutor;
pub use guardian::{ForeignKeyGuardian, ForeignKeySnapshot, RestoreReport};
pub use rebuild::{RebuildOptions, RebuildReport, RebuildState, SafeRebuild};
pub use report::{SyncSummary, TableOutcome, TableReport};

/// Definition text for one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub table: String,
    pub text: String,
    pub source: Option<PathBuf>,
}

impl TableDefinition {
    pub fn new(table: &str, text: &str) -> Self {
        Self {
            table: table.to_string(),
            text: text.to_string(),
            source: None,
        }
    }
}

/// Load every definition file under `sync.definitions_dir`
///
/// The directory is walked recursively in file-name order. The table name
/// comes from the `create('<table>'` marker when present, otherwise from the
/// file name. Results are sorted by table name.
pub fn load_definitions(config: &SyncConfig) -> Result<Vec<TableDefinition>> {
    let base_path = Path::new(&config.definitions_dir);
    if !base_path.is_dir() {
        return Err(Error::Config(format!(
            "Definitions directory does not exist: {}",
            config.definitions_dir
        )));
    }
    let extension = config.extension.trim_start_matches('.');

    let mut definitions: Vec<TableDefinition> = Vec::new();
    for entry in WalkDir::new(base_path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != extension) {
            continue;
        }

        let text = fs::read_to_string(path)?;
        let table = extract_block(&text)
            .and_then(|block| block.table)
            .or_else(|| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(table_name_from_file_stem)
            })
            .ok_or_else(|| Error::Config(format!("Cannot derive table name from {}", path.display())))?;

        if definitions.iter().any(|d| d.table == table) {
            tracing::warn!(table = %table, path = %path.display(), "Duplicate definition ignored");
            continue;
        }
        definitions.push(TableDefinition {
            table,
            text,
            source: Some(path.to_path_buf()),
        });
    }

    definitions.sort_by(|a, b| a.table.cmp(&b.table));
    tracing::debug!(count = definitions.len(), dir = %config.definitions_dir, "Loaded definitions");
    Ok(definitions)
}

/// Drives parse, introspection, diff and execution for each table
pub struct Synchronizer<'a> {
    db: &'a dyn Database,
    config: SyncConfig,
    mapper: TypeMapper,
    protected: ProtectedColumns,
}

impl<'a> Synchronizer<'a> {
    pub fn new(db: &'a dyn Database, config: &SyncConfig, type_mapping: &TypeMappingConfig) -> Self {
        Self {
            db,
            config: config.clone(),
            mapper: TypeMapper::new(type_mapping),
            protected: ProtectedColumns::new(&config.protected_columns),
        }
    }

    /// Synchronize the given definitions
    ///
    /// With `sync.tables` set, only those tables are processed, in that order;
    /// otherwise every definition is processed in table-name order.
    pub async fn sync_all(&self, definitions: &[TableDefinition]) -> SyncSummary {
        let started = Instant::now();
        let mut summary = SyncSummary::default();

        let selected: Vec<(&str, Option<&TableDefinition>)> = if self.config.tables.is_empty() {
            let mut sorted: Vec<&TableDefinition> = definitions.iter().collect();
            sorted.sort_by(|a, b| a.table.cmp(&b.table));
            sorted.into_iter().map(|d| (d.table.as_str(), Some(d))).collect()
        } else {
            let mut seen = HashSet::new();
            self.config
                .tables
                .iter()
                .filter(|t| seen.insert(t.as_str()))
                .map(|t| (t.as_str(), definitions.iter().find(|d| &d.table == t)))
                .collect()
        };

        for (table, definition) in selected {
            match definition {
                Some(definition) => {
                    let (report, skipped_on_error) = self.sync_table(definition).await;
                    summary.record(report, skipped_on_error);
                }
                None => {
                    tracing::warn!(table, "No definition found, skipping");
                    summary.record(
                        TableReport::new(
                            table,
                            TableOutcome::Skipped {
                                reason: "no definition found".to_string(),
                            },
                        ),
                        false,
                    );
                }
            }
        }

        summary.finish(started.elapsed());
        summary
    }

    /// Synchronize one table; never fails, errors become the outcome
    ///
    /// The flag is set when the table was skipped because of an error.
    pub async fn sync_table(&self, definition: &TableDefinition) -> (TableReport, bool) {
        let span = tracing::info_span!("table", table = %definition.table);

        match self.process(definition).instrument(span).await {
            Ok((outcome, change_set)) => {
                let report = TableReport::new(&definition.table, outcome);
                (
                    match change_set {
                        Some(change_set) => report.with_changes(&change_set),
                        None => report,
                    },
                    false,
                )
            }
            Err(e) if e.is_skip() => {
                tracing::error!(table = %definition.table, error = %e, "Skipping table");
                (
                    TableReport::new(&definition.table, TableOutcome::Skipped { reason: e.to_string() }),
                    true,
                )
            }
            Err(e) => {
                tracing::error!(table = %definition.table, error = %e, "Table synchronization failed");
                (
                    TableReport::new(&definition.table, TableOutcome::Failed { error: e.to_string() }),
                    false,
                )
            }
        }
    }

    async fn process(&self, definition: &TableDefinition) -> Result<(TableOutcome, Option<ChangeSet>)> {
        let parsed = parse_definition(&definition.table, &definition.text)?;
        let table = parsed.schema.name.clone();
        if !parsed.unparsed.is_empty() {
            tracing::info!(table = %table, lines = parsed.unparsed.len(), "Ignored unrecognized definition lines");
        }

        if !self.db.table_exists(&table).await.map_err(|e| Error::introspection(&table, e.to_string()))? {
            tracing::warn!(table = %table, "Table does not exist, skipping");
            return Ok((
                TableOutcome::Skipped {
                    reason: "table does not exist".to_string(),
                },
                None,
            ));
        }

        let analyzer = SchemaAnalyzer::new(self.db);
        let actual = analyzer.analyze_table(&table).await?;

        let context = DiffContext {
            mapper: &self.mapper,
            protected: &self.protected,
        };
        let change_set = diff(&parsed.schema, &actual, &context);
        if change_set.is_empty() {
            tracing::info!(table = %table, "Table is in sync");
            return Ok((TableOutcome::Unchanged, None));
        }
        change_set.log();

        let assessment = assess(&change_set, self.config.force);
        tracing::info!(
            table = %table,
            strategy = %assessment.strategy,
            reasons = ?assessment.reasons,
            "Selected execution strategy"
        );

        let incoming = analyzer.referencing_foreign_keys(&table).await?;
        direct::check_dependencies(&change_set, &incoming, self.config.force)?;

        let has_primary_key = !actual.primary_key().is_empty();
        if self.config.dry_run {
            let statements = direct::plan(&table, &change_set, &incoming, &self.mapper, has_primary_key);
            StatementExecutor::new(self.db).preview(&statements);
            return Ok((
                TableOutcome::Planned {
                    strategy: assessment.strategy,
                    statements: statements.len(),
                },
                Some(change_set),
            ));
        }

        let outcome = match assessment.strategy {
            Strategy::Direct => {
                let statements = direct::plan(&table, &change_set, &incoming, &self.mapper, has_primary_key);
                let outcome = DirectExecutor::new(self.db, self.config.continue_on_error)
                    .apply(&statements)
                    .await;
                if outcome.is_complete() {
                    TableOutcome::Updated {
                        strategy: Strategy::Direct,
                    }
                } else if outcome.completed == 0 {
                    TableOutcome::Failed {
                        error: outcome.errors.join("; "),
                    }
                } else {
                    TableOutcome::PartiallyUpdated {
                        completed: outcome.completed,
                        attempted: outcome.attempted,
                    }
                }
            }
            Strategy::SafeRebuild => {
                let options = RebuildOptions {
                    batch_size: self.config.batch_size,
                    force: self.config.force,
                };
                let report = SafeRebuild::new(self.db, &self.mapper, options)
                    .run(&actual, &change_set)
                    .await?;
                tracing::info!(
                    table = %table,
                    rows = report.final_rows,
                    restored_foreign_keys = report.foreign_keys.restored.len(),
                    "Safe rebuild committed"
                );
                TableOutcome::Updated {
                    strategy: Strategy::SafeRebuild,
                }
            }
        };

        Ok((outcome, Some(change_set)))
    }
}
