//! In-memory `Database` used by the integration tests
//!
//! Tables hold catalog rows and a row count instead of data. Statements are
//! applied structurally and enforce the MySQL rules the engine has to respect:
//! a column or table still used by a foreign key cannot be dropped, constraint
//! names are unique across the schema, and a foreign key gets a backing index.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

use table_sync::db::catalog::{ColumnRow, ForeignKeyRow, IndexRow};
use table_sync::db::connection::Database;
use table_sync::db::statement::{ColumnDefinition, Statement};
use table_sync::error::{Error, Result};
use table_sync::schema::types::{DefaultValue, IndexKind};

#[derive(Debug, Clone, Default)]
pub struct MockTable {
    pub columns: Vec<ColumnRow>,
    pub indexes: Vec<IndexRow>,
    pub foreign_keys: Vec<ForeignKeyRow>,
    pub rows: u64,
}

impl MockTable {
    pub fn column(&self, name: &str) -> Option<&ColumnRow> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.iter().map(|i| i.index_name.clone()).collect();
        names.dedup();
        names
    }

    pub fn foreign_key_names(&self) -> Vec<String> {
        self.foreign_keys.iter().map(|f| f.constraint_name.clone()).collect()
    }
}

#[derive(Debug, Default)]
struct MockState {
    tables: BTreeMap<String, MockTable>,
    log: Vec<String>,
    fail_on: Vec<String>,
    /// Rows silently lost by the next copy
    copy_shortfall: u64,
    /// (copy number, table, rows) inserted once that many copies have run
    growth: Vec<(usize, String, u64)>,
    copies: usize,
    /// Column reads fail once a statement containing this pattern has run
    column_reads_fail_after: Option<String>,
    column_reads_failing: bool,
}

#[derive(Debug, Default)]
pub struct MockDatabase {
    state: Mutex<MockState>,
}

fn failure(sql: &str, message: impl Into<String>) -> Error {
    Error::StatementExecution {
        sql: sql.to_string(),
        message: message.into(),
    }
}

fn catalog_default(default: &Option<DefaultValue>) -> Option<String> {
    match default {
        None | Some(DefaultValue::Null) => None,
        Some(DefaultValue::Text(text)) => Some(text.clone()),
        Some(DefaultValue::Number(number)) => Some(number.clone()),
        Some(DefaultValue::Bool(flag)) => Some(if *flag { "1" } else { "0" }.to_string()),
        Some(DefaultValue::CurrentTimestamp) => Some("CURRENT_TIMESTAMP".to_string()),
    }
}

fn column_row_from(definition: &ColumnDefinition, key: &str) -> ColumnRow {
    let column = &definition.column;
    ColumnRow {
        column_name: column.name.clone(),
        column_type: definition.native.clone(),
        is_nullable: if column.nullable { "YES" } else { "NO" }.to_string(),
        column_default: catalog_default(&column.default),
        column_comment: column.comment.clone().unwrap_or_default(),
        column_key: key.to_string(),
        extra: if column.auto_increment { "auto_increment" } else { "" }.to_string(),
    }
}

pub fn column(name: &str, column_type: &str, nullable: bool) -> ColumnRow {
    ColumnRow {
        column_name: name.to_string(),
        column_type: column_type.to_string(),
        is_nullable: if nullable { "YES" } else { "NO" }.to_string(),
        column_default: None,
        column_comment: String::new(),
        column_key: String::new(),
        extra: String::new(),
    }
}

pub fn column_with_default(name: &str, column_type: &str, nullable: bool, default: &str) -> ColumnRow {
    ColumnRow {
        column_default: Some(default.to_string()),
        ..column(name, column_type, nullable)
    }
}

/// `bigint unsigned` auto-increment primary key
pub fn id_column() -> ColumnRow {
    ColumnRow {
        column_key: "PRI".to_string(),
        extra: "auto_increment".to_string(),
        ..column("id", "bigint(20) unsigned", false)
    }
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn add_table(&self, name: &str, columns: Vec<ColumnRow>, rows: u64) {
        let mut table = MockTable {
            columns,
            rows,
            ..Default::default()
        };
        for column in table.columns.iter().filter(|c| c.column_key == "PRI") {
            table.indexes.push(IndexRow {
                index_name: "PRIMARY".to_string(),
                column_name: column.column_name.clone(),
                non_unique: 0,
                seq_in_index: 1,
                index_type: "BTREE".to_string(),
            });
        }
        self.state().tables.insert(name.to_string(), table);
    }

    pub fn add_index(&self, table: &str, name: &str, unique: bool, columns: &[&str]) {
        let mut state = self.state();
        let entry = state.tables.get_mut(table).unwrap();
        for (i, column) in columns.iter().enumerate() {
            entry.indexes.push(IndexRow {
                index_name: name.to_string(),
                column_name: column.to_string(),
                non_unique: if unique { 0 } else { 1 },
                seq_in_index: i as i64 + 1,
                index_type: "BTREE".to_string(),
            });
        }
    }

    /// Foreign key with RESTRICT rules plus its backing index
    pub fn add_foreign_key(&self, table: &str, name: &str, column: &str, referenced_table: &str, referenced_column: &str) {
        let mut state = self.state();
        let entry = state.tables.get_mut(table).unwrap();
        entry.foreign_keys.push(ForeignKeyRow {
            constraint_name: name.to_string(),
            table_name: table.to_string(),
            column_name: column.to_string(),
            referenced_table: referenced_table.to_string(),
            referenced_column: referenced_column.to_string(),
            delete_rule: "RESTRICT".to_string(),
            update_rule: "RESTRICT".to_string(),
        });
        ensure_backing_index(entry, name, column);
    }

    /// Fail every statement whose SQL contains `pattern`
    pub fn fail_on(&self, pattern: &str) {
        self.state().fail_on.push(pattern.to_string());
    }

    /// Make the next row copy lose `rows` rows
    pub fn lose_rows_on_copy(&self, rows: u64) {
        self.state().copy_shortfall = rows;
    }

    /// Insert `rows` into `table` right after the `copy`-th row copy
    pub fn insert_rows_after_copy(&self, copy: usize, table: &str, rows: u64) {
        self.state().growth.push((copy, table.to_string(), rows));
    }

    /// Fail column introspection once a statement containing `pattern` succeeds
    pub fn fail_column_reads_after(&self, pattern: &str) {
        self.state().column_reads_fail_after = Some(pattern.to_string());
    }

    pub fn table(&self, name: &str) -> Option<MockTable> {
        self.state().tables.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state().tables.keys().cloned().collect()
    }

    /// SQL of every successfully executed statement, in order
    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn clear_log(&self) {
        self.state().log.clear();
    }
}

fn ensure_backing_index(table: &mut MockTable, name: &str, column: &str) {
    let backed = table
        .indexes
        .iter()
        .any(|i| i.seq_in_index == 1 && i.column_name == column);
    if !backed {
        table.indexes.push(IndexRow {
            index_name: name.to_string(),
            column_name: column.to_string(),
            non_unique: 1,
            seq_in_index: 1,
            index_type: "BTREE".to_string(),
        });
    }
}

impl MockState {
    fn table_mut(&mut self, name: &str, sql: &str) -> Result<&mut MockTable> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| failure(sql, format!("Table '{}' doesn't exist", name)))
    }

    fn constraint_exists(&self, name: &str) -> bool {
        self.tables
            .values()
            .any(|t| t.foreign_keys.iter().any(|f| f.constraint_name == name))
    }

    /// Foreign keys in other tables pointing at `table`, optionally at one column
    fn referenced_by(&self, table: &str, column: Option<&str>) -> Option<String> {
        self.tables.iter().find_map(|(name, t)| {
            t.foreign_keys
                .iter()
                .find(|f| {
                    name != table
                        && f.referenced_table == table
                        && column.map_or(true, |c| f.referenced_column == c)
                })
                .map(|f| f.constraint_name.clone())
        })
    }

    fn apply(&mut self, statement: &Statement, sql: &str) -> Result<u64> {
        match statement {
            Statement::AddColumn {
                table,
                definition,
                primary_key,
            } => {
                let entry = self.table_mut(table, sql)?;
                if entry.column(&definition.column.name).is_some() {
                    return Err(failure(sql, "Duplicate column name"));
                }
                let row = column_row_from(definition, if *primary_key { "PRI" } else { "" });
                let position = definition
                    .column
                    .after
                    .as_ref()
                    .and_then(|after| entry.columns.iter().position(|c| &c.column_name == after))
                    .map(|i| i + 1)
                    .unwrap_or(entry.columns.len());
                entry.columns.insert(position, row);
                Ok(0)
            }
            Statement::ModifyColumn { table, definition } => {
                let entry = self.table_mut(table, sql)?;
                let existing = entry
                    .columns
                    .iter_mut()
                    .find(|c| c.column_name == definition.column.name)
                    .ok_or_else(|| failure(sql, "Unknown column"))?;
                let key = existing.column_key.clone();
                *existing = column_row_from(definition, &key);
                Ok(entry.rows)
            }
            Statement::DropColumn { table, column } => {
                if let Some(constraint) = self.referenced_by(table, Some(column)) {
                    return Err(failure(sql, format!("Cannot drop column needed in foreign key {}", constraint)));
                }
                let entry = self.table_mut(table, sql)?;
                if entry.foreign_keys.iter().any(|f| &f.column_name == column) {
                    return Err(failure(sql, "Cannot drop column needed in a foreign key constraint"));
                }
                let before = entry.columns.len();
                entry.columns.retain(|c| &c.column_name != column);
                if entry.columns.len() == before {
                    return Err(failure(sql, "Can't DROP column; check that it exists"));
                }
                entry.indexes.retain(|i| &i.column_name != column);
                Ok(0)
            }
            Statement::AddIndex { table, index } => {
                let entry = self.table_mut(table, sql)?;
                if entry.indexes.iter().any(|i| i.index_name == index.name) {
                    return Err(failure(sql, "Duplicate key name"));
                }
                for (i, column) in index.columns.iter().enumerate() {
                    if entry.column(column).is_none() {
                        return Err(failure(sql, format!("Key column '{}' doesn't exist", column)));
                    }
                    entry.indexes.push(IndexRow {
                        index_name: index.name.clone(),
                        column_name: column.clone(),
                        non_unique: if index.kind == IndexKind::Unique { 0 } else { 1 },
                        seq_in_index: i as i64 + 1,
                        index_type: if index.kind == IndexKind::Spatial { "SPATIAL" } else { "BTREE" }.to_string(),
                    });
                }
                Ok(0)
            }
            Statement::DropIndex { table, name } => {
                let entry = self.table_mut(table, sql)?;
                let leftmost = entry
                    .indexes
                    .iter()
                    .find(|i| &i.index_name == name && i.seq_in_index == 1)
                    .map(|i| i.column_name.clone());
                if let Some(column) = leftmost {
                    let constrained = entry.foreign_keys.iter().any(|f| f.column_name == column);
                    let other_backing = entry
                        .indexes
                        .iter()
                        .any(|i| &i.index_name != name && i.seq_in_index == 1 && i.column_name == column);
                    if constrained && !other_backing {
                        return Err(failure(sql, "Cannot drop index: needed in a foreign key constraint"));
                    }
                }
                let before = entry.indexes.len();
                entry.indexes.retain(|i| &i.index_name != name);
                if entry.indexes.len() == before {
                    return Err(failure(sql, "Can't DROP index; check that it exists"));
                }
                Ok(0)
            }
            Statement::AddForeignKey { table, foreign_key } => {
                if self.constraint_exists(&foreign_key.name) {
                    return Err(failure(sql, "Duplicate foreign key constraint name"));
                }
                let target_ok = self
                    .tables
                    .get(&foreign_key.referenced_table)
                    .is_some_and(|t| t.column(&foreign_key.referenced_column).is_some());
                if !target_ok {
                    return Err(failure(sql, "Failed to open the referenced table or column"));
                }
                let entry = self.table_mut(table, sql)?;
                if entry.column(&foreign_key.column).is_none() {
                    return Err(failure(sql, "Key column doesn't exist in table"));
                }
                entry.foreign_keys.push(ForeignKeyRow {
                    constraint_name: foreign_key.name.clone(),
                    table_name: table.clone(),
                    column_name: foreign_key.column.clone(),
                    referenced_table: foreign_key.referenced_table.clone(),
                    referenced_column: foreign_key.referenced_column.clone(),
                    delete_rule: foreign_key.on_delete.as_sql().to_string(),
                    update_rule: foreign_key.on_update.as_sql().to_string(),
                });
                ensure_backing_index(entry, &foreign_key.name, &foreign_key.column);
                Ok(0)
            }
            Statement::DropForeignKey { table, name } => {
                let entry = self.table_mut(table, sql)?;
                let before = entry.foreign_keys.len();
                entry.foreign_keys.retain(|f| &f.constraint_name != name);
                if entry.foreign_keys.len() == before {
                    return Err(failure(sql, "Can't DROP foreign key; check that it exists"));
                }
                Ok(0)
            }
            Statement::CreateTableLike { table, source } => {
                if self.tables.contains_key(table) {
                    return Err(failure(sql, "Table already exists"));
                }
                let original = self
                    .tables
                    .get(source)
                    .ok_or_else(|| failure(sql, "Source table doesn't exist"))?;
                let clone = MockTable {
                    columns: original.columns.clone(),
                    indexes: original.indexes.clone(),
                    foreign_keys: Vec::new(),
                    rows: 0,
                };
                self.tables.insert(table.clone(), clone);
                Ok(0)
            }
            Statement::RenameTables(pairs) => {
                // all or nothing
                let mut tables = self.tables.clone();
                for (from, to) in pairs {
                    if tables.contains_key(to) {
                        return Err(failure(sql, format!("Table '{}' already exists", to)));
                    }
                    let mut moved = tables
                        .remove(from)
                        .ok_or_else(|| failure(sql, format!("Table '{}' doesn't exist", from)))?;
                    for fk in moved.foreign_keys.iter_mut() {
                        fk.table_name = to.clone();
                    }
                    tables.insert(to.clone(), moved);
                    for other in tables.values_mut() {
                        for fk in other.foreign_keys.iter_mut() {
                            if &fk.referenced_table == from {
                                fk.referenced_table = to.clone();
                            }
                        }
                    }
                }
                self.tables = tables;
                Ok(0)
            }
            Statement::DropTable { table } => {
                if let Some(constraint) = self.referenced_by(table, None) {
                    return Err(failure(sql, format!("Cannot drop table referenced by {}", constraint)));
                }
                self.tables.remove(table);
                Ok(0)
            }
            Statement::CopyRows(copy) => {
                let source = self
                    .tables
                    .get(&copy.source)
                    .cloned()
                    .ok_or_else(|| failure(sql, "Source table doesn't exist"))?;
                let shortfall = std::mem::take(&mut self.copy_shortfall);
                let target = self.table_mut(&copy.target, sql)?;

                for column in &copy.columns {
                    let from = source
                        .column(&column.name)
                        .ok_or_else(|| failure(sql, format!("Unknown column '{}' in source", column.name)))?;
                    let to = target
                        .column(&column.name)
                        .ok_or_else(|| failure(sql, format!("Unknown column '{}' in target", column.name)))?;
                    let required = to.is_nullable == "NO" && to.column_default.is_none() && to.extra.is_empty();
                    if required && from.is_nullable == "YES" && column.placeholder.is_none() {
                        return Err(failure(sql, format!("Column '{}' cannot be null", column.name)));
                    }
                }

                let available = source.rows.saturating_sub(copy.offset);
                let copied = copy.limit.map_or(available, |limit| limit.min(available));
                let copied = copied.saturating_sub(shortfall);
                target.rows += copied;
                Ok(copied)
            }
        }
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let sql = statement.to_sql();
        let mut state = self.state();
        if state.fail_on.iter().any(|pattern| sql.contains(pattern.as_str())) {
            return Err(failure(&sql, "injected failure"));
        }
        let affected = state.apply(statement, &sql)?;
        if matches!(statement, Statement::CopyRows(_)) {
            state.copies += 1;
            let copies = state.copies;
            let arriving: Vec<(String, u64)> = state
                .growth
                .iter()
                .filter(|(after, _, _)| *after == copies)
                .map(|(_, table, rows)| (table.clone(), *rows))
                .collect();
            for (table, rows) in arriving {
                if let Some(entry) = state.tables.get_mut(&table) {
                    entry.rows += rows;
                }
            }
        }
        if state
            .column_reads_fail_after
            .as_ref()
            .is_some_and(|pattern| sql.contains(pattern.as_str()))
        {
            state.column_reads_failing = true;
        }
        state.log.push(sql);
        Ok(affected)
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.state().tables.contains_key(table))
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        self.state()
            .tables
            .get(table)
            .map(|t| t.rows)
            .ok_or_else(|| Error::introspection(table, "table doesn't exist"))
    }

    async fn column_rows(&self, table: &str) -> Result<Vec<ColumnRow>> {
        let state = self.state();
        if state.column_reads_failing {
            return Err(Error::introspection(table, "injected catalog failure"));
        }
        Ok(state.tables.get(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>> {
        Ok(self.state().tables.get(table).map(|t| t.indexes.clone()).unwrap_or_default())
    }

    async fn foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        Ok(self
            .state()
            .tables
            .get(table)
            .map(|t| t.foreign_keys.clone())
            .unwrap_or_default())
    }

    async fn referencing_foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        let state = self.state();
        Ok(state
            .tables
            .iter()
            .filter(|(name, _)| name.as_str() != table)
            .flat_map(|(_, t)| t.foreign_keys.iter())
            .filter(|f| f.referenced_table == table)
            .cloned()
            .collect())
    }
}
