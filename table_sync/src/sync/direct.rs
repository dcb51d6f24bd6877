//! In-place application of a change set
//!
//! Statements are ordered so that nothing is removed while something else
//! still depends on it, and nothing is added before what it depends on exists.

use crate::db::connection::Database;
use crate::db::executor::{BatchOutcome, StatementExecutor};
use crate::db::statement::{ColumnDefinition, Statement};
use crate::error::{Error, Result};
use crate::schema::diff::ChangeSet;
use crate::schema::type_map::TypeMapper;
use crate::schema::types::ForeignKeyDescriptor;

/// Refuse to drop columns other tables still reference, unless forced
pub fn check_dependencies(change_set: &ChangeSet, incoming: &[ForeignKeyDescriptor], force: bool) -> Result<()> {
    for fk in incoming {
        if !change_set.drops_column(&fk.referenced_column) {
            continue;
        }
        if force {
            tracing::warn!(
                table = %change_set.table,
                column = %fk.referenced_column,
                constraint = %fk.name,
                referencing_table = %fk.table,
                "Forced: referencing foreign key will be dropped with the column"
            );
            continue;
        }
        return Err(Error::ConstraintDependency {
            table: change_set.table.clone(),
            column: fk.referenced_column.clone(),
            constraint: fk.name.clone(),
            referencing_table: fk.table.clone(),
        });
    }
    Ok(())
}

/// Order the change set into statements against `target`
///
/// `incoming` are foreign keys in other tables referencing the table; the ones
/// on dropped columns are removed right before their column.
pub fn plan(
    target: &str,
    change_set: &ChangeSet,
    incoming: &[ForeignKeyDescriptor],
    mapper: &TypeMapper,
    has_primary_key: bool,
) -> Vec<Statement> {
    let mut statements = Vec::new();

    for fk in &change_set.drop_foreign_keys {
        statements.push(Statement::DropForeignKey {
            table: target.to_string(),
            name: fk.name.clone(),
        });
    }

    for index in &change_set.drop_indexes {
        statements.push(Statement::DropIndex {
            table: target.to_string(),
            name: index.name.clone(),
        });
    }

    for column in &change_set.drop_columns {
        for fk in incoming.iter().filter(|fk| &fk.referenced_column == column) {
            statements.push(Statement::DropForeignKey {
                table: fk.table.clone(),
                name: fk.name.clone(),
            });
        }
        statements.push(Statement::DropColumn {
            table: target.to_string(),
            column: column.clone(),
        });
    }

    for column in &change_set.add_columns {
        statements.push(Statement::AddColumn {
            table: target.to_string(),
            definition: ColumnDefinition::new(column.clone(), mapper.native_for(column)),
            primary_key: column.primary_key && !has_primary_key,
        });
    }

    for change in &change_set.modify_columns {
        statements.push(Statement::ModifyColumn {
            table: target.to_string(),
            definition: ColumnDefinition::new(change.column.clone(), mapper.native_for(&change.column)),
        });
    }

    for index in &change_set.add_indexes {
        statements.push(Statement::AddIndex {
            table: target.to_string(),
            index: index.clone(),
        });
    }

    for fk in &change_set.add_foreign_keys {
        let mut foreign_key = fk.clone();
        foreign_key.table = target.to_string();
        statements.push(Statement::AddForeignKey {
            table: target.to_string(),
            foreign_key,
        });
    }

    statements
}

/// Applies a planned change set statement by statement
pub struct DirectExecutor<'a> {
    executor: StatementExecutor<'a>,
    continue_on_error: bool,
}

impl<'a> DirectExecutor<'a> {
    pub fn new(db: &'a dyn Database, continue_on_error: bool) -> Self {
        Self {
            executor: StatementExecutor::new(db),
            continue_on_error,
        }
    }

    /// Run the statements, best effort unless configured to stop at the first failure
    pub async fn apply(&self, statements: &[Statement]) -> BatchOutcome {
        let outcome = self
            .executor
            .execute_best_effort(statements, self.continue_on_error)
            .await;

        if !outcome.is_complete() {
            tracing::warn!(
                completed = outcome.completed,
                attempted = outcome.attempted,
                total = statements.len(),
                "Direct change applied partially"
            );
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{
        AbstractType, ColumnDescriptor, IndexDescriptor, IndexKind, ReferentialAction,
    };
    use pretty_assertions::assert_eq;

    fn fk(table: &str, column: &str, referenced_table: &str, referenced_column: &str) -> ForeignKeyDescriptor {
        ForeignKeyDescriptor {
            name: format!("{}_{}_foreign", table, column),
            table: table.to_string(),
            column: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
            on_delete: ReferentialAction::Restrict,
            on_update: ReferentialAction::Restrict,
        }
    }

    #[test]
    fn test_plan_order() {
        let mut change_set = ChangeSet::new("products");
        change_set.drop_foreign_keys.push(fk("products", "category_id", "categories", "id"));
        change_set.drop_columns.push("category_id".to_string());
        change_set.drop_indexes.push(IndexDescriptor::new(
            "index_sku",
            IndexKind::Normal,
            vec!["sku".to_string()],
        ));
        change_set.add_columns.push(ColumnDescriptor::new("email", AbstractType::String).nullable(true));
        change_set.add_indexes.push(IndexDescriptor::new(
            "unique_email",
            IndexKind::Unique,
            vec!["email".to_string()],
        ));

        let statements = plan("products", &change_set, &[], &TypeMapper::default(), true);
        let sql: Vec<String> = statements.iter().map(Statement::to_sql).collect();
        assert_eq!(
            sql,
            vec![
                "ALTER TABLE `products` DROP FOREIGN KEY `products_category_id_foreign`",
                "ALTER TABLE `products` DROP INDEX `index_sku`",
                "ALTER TABLE `products` DROP COLUMN `category_id`",
                "ALTER TABLE `products` ADD COLUMN `email` varchar(255) NULL",
                "ALTER TABLE `products` ADD UNIQUE INDEX `unique_email` (`email`)",
            ]
        );
    }

    #[test]
    fn test_incoming_keys_dropped_before_their_column() {
        let mut change_set = ChangeSet::new("users");
        change_set.drop_columns.push("uuid".to_string());
        let incoming = vec![fk("sessions", "user_uuid", "users", "uuid")];

        assert!(matches!(
            check_dependencies(&change_set, &incoming, false),
            Err(Error::ConstraintDependency { .. })
        ));
        assert!(check_dependencies(&change_set, &incoming, true).is_ok());

        let statements = plan("users", &change_set, &incoming, &TypeMapper::default(), true);
        assert_eq!(
            statements,
            vec![
                Statement::DropForeignKey {
                    table: "sessions".to_string(),
                    name: "sessions_user_uuid_foreign".to_string(),
                },
                Statement::DropColumn {
                    table: "users".to_string(),
                    column: "uuid".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_plan_retargets_foreign_keys() {
        let mut change_set = ChangeSet::new("posts");
        change_set.add_foreign_keys.push(fk("posts", "user_id", "users", "id"));

        let statements = plan("posts_sync_0000abcd", &change_set, &[], &TypeMapper::default(), true);
        let Statement::AddForeignKey { table, foreign_key } = &statements[0] else {
            panic!("expected foreign key statement");
        };
        assert_eq!(table, "posts_sync_0000abcd");
        assert_eq!(foreign_key.table, "posts_sync_0000abcd");
    }
}
