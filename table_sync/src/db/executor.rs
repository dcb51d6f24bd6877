//! Statement executor
//!
//! Runs planned statements in order against a [`Database`].

use crate::db::connection::Database;
use crate::db::statement::Statement;
use crate::error::Result;

/// Result of a best-effort batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub completed: usize,
    pub attempted: usize,
    /// One message per failed statement
    pub errors: Vec<String>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty() && self.completed == self.attempted
    }
}

/// Statement executor for running planned changes
pub struct StatementExecutor<'a> {
    db: &'a dyn Database,
}

impl<'a> StatementExecutor<'a> {
    /// Create a new statement executor
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// Execute a single statement
    pub async fn execute(&self, statement: &Statement) -> Result<u64> {
        tracing::debug!(table = %statement.table(), sql = %statement, "Executing statement");
        self.db.execute(statement).await
    }

    /// Execute statements in order, stopping at the first failure
    pub async fn execute_batch(&self, statements: &[Statement]) -> Result<()> {
        for statement in statements {
            self.execute(statement).await?;
        }

        Ok(())
    }

    /// Execute statements in order, recording failures
    ///
    /// With `continue_on_error` unset the batch stops after the first failure;
    /// the statements after it are counted neither as completed nor attempted.
    pub async fn execute_best_effort(&self, statements: &[Statement], continue_on_error: bool) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for statement in statements {
            outcome.attempted += 1;
            match self.execute(statement).await {
                Ok(_) => outcome.completed += 1,
                Err(e) => {
                    tracing::error!(table = %statement.table(), sql = %statement, error = %e, "Statement failed");
                    outcome.errors.push(e.to_string());
                    if !continue_on_error {
                        break;
                    }
                }
            }
        }

        outcome
    }

    /// Log statements without applying them
    pub fn preview(&self, statements: &[Statement]) {
        for (i, statement) in statements.iter().enumerate() {
            tracing::info!(statement_number = i + 1, table = %statement.table(), sql = %statement, "Planned statement (dry run)");
        }
    }
}
