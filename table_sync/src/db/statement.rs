//! Typed DDL/DML statements
//!
//! Planners produce [`Statement`] values; they are rendered to MySQL SQL only
//! when executed (or logged).

use std::fmt;

use crate::schema::types::{ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, IndexKind};
use crate::utils::naming::{quote_ident, quote_literal};

/// A column together with its resolved native type
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub column: ColumnDescriptor,
    pub native: String,
}

impl ColumnDefinition {
    pub fn new(column: ColumnDescriptor, native: String) -> Self {
        Self { column, native }
    }

    /// `name type [NOT] NULL [DEFAULT x] [AUTO_INCREMENT] [COMMENT '...']`
    fn to_sql(&self) -> String {
        let column = &self.column;
        let mut sql = format!("{} {}", quote_ident(&column.name), self.native);

        sql.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &column.default {
            sql.push_str(&format!(" DEFAULT {}", default.to_sql()));
        }
        if column.auto_increment {
            sql.push_str(" AUTO_INCREMENT");
        }
        if let Some(comment) = &column.comment {
            sql.push_str(&format!(" COMMENT {}", quote_literal(comment)));
        }
        sql
    }
}

/// One column of an `INSERT ... SELECT` copy
#[derive(Debug, Clone, PartialEq)]
pub struct CopyColumn {
    pub name: String,
    /// Literal substituted for NULL source values
    pub placeholder: Option<String>,
}

/// Batched row copy between two tables with the same column names
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRows {
    pub source: String,
    pub target: String,
    pub columns: Vec<CopyColumn>,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: u64,
}

impl CopyRows {
    fn to_sql(&self) -> String {
        let targets = self
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let selects = self
            .columns
            .iter()
            .map(|c| match &c.placeholder {
                Some(placeholder) => format!("COALESCE({}, {})", quote_ident(&c.name), placeholder),
                None => quote_ident(&c.name),
            })
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!(
            "INSERT INTO {} ({}) SELECT {} FROM {}",
            quote_ident(&self.target),
            targets,
            selects,
            quote_ident(&self.source)
        );
        if !self.order_by.is_empty() {
            let order = self
                .order_by
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {}", order));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, self.offset));
        }
        sql
    }
}

/// A single statement against the live database
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    AddColumn {
        table: String,
        definition: ColumnDefinition,
        /// Also declare the column as the primary key
        primary_key: bool,
    },
    ModifyColumn {
        table: String,
        definition: ColumnDefinition,
    },
    DropColumn {
        table: String,
        column: String,
    },
    AddIndex {
        table: String,
        index: IndexDescriptor,
    },
    DropIndex {
        table: String,
        name: String,
    },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKeyDescriptor,
    },
    DropForeignKey {
        table: String,
        name: String,
    },
    CreateTableLike {
        table: String,
        source: String,
    },
    /// Atomic multi-table rename
    RenameTables(Vec<(String, String)>),
    DropTable {
        table: String,
    },
    CopyRows(CopyRows),
}

impl Statement {
    /// Table the statement writes to
    pub fn table(&self) -> &str {
        match self {
            Statement::AddColumn { table, .. }
            | Statement::ModifyColumn { table, .. }
            | Statement::DropColumn { table, .. }
            | Statement::AddIndex { table, .. }
            | Statement::DropIndex { table, .. }
            | Statement::AddForeignKey { table, .. }
            | Statement::DropForeignKey { table, .. }
            | Statement::CreateTableLike { table, .. }
            | Statement::DropTable { table } => table,
            Statement::RenameTables(pairs) => pairs.first().map(|(from, _)| from.as_str()).unwrap_or(""),
            Statement::CopyRows(copy) => &copy.target,
        }
    }

    /// Whether the statement creates or removes a foreign key
    pub fn is_foreign_key(&self) -> bool {
        matches!(self, Statement::AddForeignKey { .. } | Statement::DropForeignKey { .. })
    }

    /// Render as MySQL SQL
    pub fn to_sql(&self) -> String {
        match self {
            Statement::AddColumn {
                table,
                definition,
                primary_key,
            } => {
                let mut sql = format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    quote_ident(table),
                    definition.to_sql()
                );
                if *primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if let Some(after) = &definition.column.after {
                    sql.push_str(&format!(" AFTER {}", quote_ident(after)));
                }
                sql
            }
            Statement::ModifyColumn { table, definition } => format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                quote_ident(table),
                definition.to_sql()
            ),
            Statement::DropColumn { table, column } => format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quote_ident(table),
                quote_ident(column)
            ),
            Statement::AddIndex { table, index } => {
                let kind = match index.kind {
                    IndexKind::Unique => "UNIQUE INDEX",
                    IndexKind::Normal => "INDEX",
                    IndexKind::Spatial => "SPATIAL INDEX",
                };
                let columns = index
                    .columns
                    .iter()
                    .map(|c| quote_ident(c))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "ALTER TABLE {} ADD {} {} ({})",
                    quote_ident(table),
                    kind,
                    quote_ident(&index.name),
                    columns
                )
            }
            Statement::DropIndex { table, name } => format!(
                "ALTER TABLE {} DROP INDEX {}",
                quote_ident(table),
                quote_ident(name)
            ),
            Statement::AddForeignKey { table, foreign_key } => format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
                quote_ident(table),
                quote_ident(&foreign_key.name),
                quote_ident(&foreign_key.column),
                quote_ident(&foreign_key.referenced_table),
                quote_ident(&foreign_key.referenced_column),
                foreign_key.on_delete.as_sql(),
                foreign_key.on_update.as_sql()
            ),
            Statement::DropForeignKey { table, name } => format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                quote_ident(table),
                quote_ident(name)
            ),
            Statement::CreateTableLike { table, source } => format!(
                "CREATE TABLE {} LIKE {}",
                quote_ident(table),
                quote_ident(source)
            ),
            Statement::RenameTables(pairs) => {
                let renames = pairs
                    .iter()
                    .map(|(from, to)| format!("{} TO {}", quote_ident(from), quote_ident(to)))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("RENAME TABLE {}", renames)
            }
            Statement::DropTable { table } => format!("DROP TABLE IF EXISTS {}", quote_ident(table)),
            Statement::CopyRows(copy) => copy.to_sql(),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}
