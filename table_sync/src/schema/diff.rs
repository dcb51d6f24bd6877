//! Table difference calculator
//!
//! Compares a desired table with the live one and produces the [`ChangeSet`]
//! that turns the live table into the desired one. The comparison is
//! directional and purely structural: nothing is renamed, and columns that
//! only exist live are dropped unless they are protected.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

use crate::schema::parser::is_current_timestamp;
use crate::schema::type_map::{native_matches, TypeMapper};
use crate::schema::types::{
    ColumnDescriptor, DefaultValue, ForeignKeyDescriptor, IndexDescriptor, TableSchema,
};
use crate::utils::naming::ProtectedColumns;

/// Comparison settings threaded through a diff
#[derive(Debug, Clone, Copy)]
pub struct DiffContext<'a> {
    pub mapper: &'a TypeMapper,
    pub protected: &'a ProtectedColumns,
}

/// Attribute of a column that differs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChangeField {
    Type,
    Nullable,
    Default,
}

impl fmt::Display for ChangeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeField::Type => "type",
            ChangeField::Nullable => "nullable",
            ChangeField::Default => "default",
        };
        f.write_str(name)
    }
}

/// One mismatch between desired and live column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeReason {
    pub field: ChangeField,
    pub desired: String,
    pub actual: String,
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.field, self.actual, self.desired)
    }
}

/// Represents a change to an existing column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnChange {
    /// Desired definition
    pub column: ColumnDescriptor,
    pub reasons: Vec<ChangeReason>,
}

impl ColumnChange {
    pub fn changes_type(&self) -> bool {
        self.reasons.iter().any(|r| r.field == ChangeField::Type)
    }
}

/// Changes needed to bring one live table in line with its definition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub table: String,
    pub add_columns: Vec<ColumnDescriptor>,
    pub modify_columns: Vec<ColumnChange>,
    pub drop_columns: Vec<String>,
    pub add_indexes: Vec<IndexDescriptor>,
    pub drop_indexes: Vec<IndexDescriptor>,
    pub drop_foreign_keys: Vec<ForeignKeyDescriptor>,
    pub add_foreign_keys: Vec<ForeignKeyDescriptor>,
}

impl ChangeSet {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Default::default()
        }
    }

    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.add_columns.is_empty()
            && self.modify_columns.is_empty()
            && self.drop_columns.is_empty()
            && self.add_indexes.is_empty()
            && self.drop_indexes.is_empty()
            && self.drop_foreign_keys.is_empty()
            && self.add_foreign_keys.is_empty()
    }

    /// Only removals: no additions or modifications of any kind
    pub fn is_drop_only(&self) -> bool {
        !self.is_empty()
            && self.add_columns.is_empty()
            && self.modify_columns.is_empty()
            && self.add_indexes.is_empty()
            && self.add_foreign_keys.is_empty()
    }

    pub fn has_index_changes(&self) -> bool {
        !self.add_indexes.is_empty() || !self.drop_indexes.is_empty()
    }

    pub fn drops_column(&self, column: &str) -> bool {
        self.drop_columns.iter().any(|c| c == column)
    }

    /// Log every change with its reason before anything is applied
    pub fn log(&self) {
        for column in &self.add_columns {
            tracing::info!(table = %self.table, column = %column.name, "Adding column: present in definition only");
        }
        for change in &self.modify_columns {
            let reasons = change.reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            tracing::info!(table = %self.table, column = %change.column.name, reasons = %reasons, "Modifying column");
        }
        for column in &self.drop_columns {
            tracing::warn!(table = %self.table, column = %column, "Dropping column: absent from definition");
        }
        for index in &self.drop_indexes {
            tracing::info!(table = %self.table, index = %index.name, "Dropping index: absent from definition or redefined");
        }
        for index in &self.add_indexes {
            tracing::info!(table = %self.table, index = %index.name, columns = ?index.columns, "Adding index");
        }
        for fk in &self.drop_foreign_keys {
            tracing::info!(table = %self.table, constraint = %fk.name, column = %fk.column, "Dropping foreign key");
        }
        for fk in &self.add_foreign_keys {
            tracing::info!(
                table = %self.table,
                constraint = %fk.name,
                references = %format!("{}.{}", fk.referenced_table, fk.referenced_column),
                "Adding foreign key"
            );
        }
    }
}

/// Compute the changes that turn `actual` into `desired`
pub fn diff(desired: &TableSchema, actual: &TableSchema, context: &DiffContext<'_>) -> ChangeSet {
    let mut change_set = ChangeSet::new(&actual.name);

    for column in &desired.columns {
        match actual.column(&column.name) {
            None => change_set.add_columns.push(column.clone()),
            Some(live) => {
                let reasons = compare_columns(column, live, context);
                if !reasons.is_empty() {
                    change_set.modify_columns.push(ColumnChange {
                        column: column.clone(),
                        reasons,
                    });
                }
            }
        }
    }

    for live in &actual.columns {
        if desired.has_column(&live.name) {
            continue;
        }
        if context.protected.contains(&live.name) {
            tracing::debug!(table = %actual.name, column = %live.name, "Keeping protected column absent from definition");
            continue;
        }
        change_set.drop_columns.push(live.name.clone());
    }

    diff_foreign_keys(desired, actual, &mut change_set);
    diff_indexes(desired, actual, &mut change_set);

    change_set
}

fn compare_columns(desired: &ColumnDescriptor, actual: &ColumnDescriptor, context: &DiffContext<'_>) -> Vec<ChangeReason> {
    let mut reasons = Vec::new();

    let desired_native = context.mapper.native_for(desired);
    let actual_native = actual.native_type();
    if !native_matches(&desired_native, &actual_native) {
        reasons.push(ChangeReason {
            field: ChangeField::Type,
            desired: desired_native,
            actual: actual_native,
        });
    }

    if desired.nullable != actual.nullable {
        reasons.push(ChangeReason {
            field: ChangeField::Nullable,
            desired: desired.nullable.to_string(),
            actual: actual.nullable.to_string(),
        });
    }

    let desired_default = normalize_default(desired.default.as_ref());
    let actual_default = normalize_default(actual.default.as_ref());
    if desired_default != actual_default {
        reasons.push(ChangeReason {
            field: ChangeField::Default,
            desired: desired_default.unwrap_or_else(|| "NULL".to_string()),
            actual: actual_default.unwrap_or_else(|| "NULL".to_string()),
        });
    }

    reasons
}

/// Normal form of a default for comparison; `None` means no default
pub fn normalize_default(default: Option<&DefaultValue>) -> Option<String> {
    let text = match default? {
        DefaultValue::Null => return None,
        DefaultValue::CurrentTimestamp => return Some("CURRENT_TIMESTAMP".to_string()),
        DefaultValue::Bool(flag) => return Some(if *flag { "1" } else { "0" }.to_string()),
        DefaultValue::Text(text) | DefaultValue::Number(text) => text.trim(),
    };

    let unquoted = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .unwrap_or(text);

    if unquoted.is_empty() || unquoted.eq_ignore_ascii_case("null") {
        return None;
    }
    if is_current_timestamp(unquoted) {
        return Some("CURRENT_TIMESTAMP".to_string());
    }
    match unquoted.to_lowercase().as_str() {
        "true" => return Some("1".to_string()),
        "false" => return Some("0".to_string()),
        _ => {}
    }
    match unquoted.parse::<f64>() {
        Ok(number) => Some(number.to_string()),
        Err(_) => Some(unquoted.to_string()),
    }
}

fn diff_foreign_keys(desired: &TableSchema, actual: &TableSchema, change_set: &mut ChangeSet) {
    for live in &actual.foreign_keys {
        if change_set.drops_column(&live.column) {
            change_set.drop_foreign_keys.push(live.clone());
        }
    }

    for wanted in &desired.foreign_keys {
        match actual.foreign_keys.iter().find(|live| live.column == wanted.column) {
            None => change_set.add_foreign_keys.push(wanted.clone()),
            Some(live) if !live.same_definition(wanted) => {
                if !change_set.drop_foreign_keys.iter().any(|fk| fk.name == live.name) {
                    change_set.drop_foreign_keys.push(live.clone());
                }
                change_set.add_foreign_keys.push(wanted.clone());
            }
            Some(_) => {}
        }
    }
}

fn diff_indexes(desired: &TableSchema, actual: &TableSchema, change_set: &mut ChangeSet) {
    let mut matched: HashSet<&str> = HashSet::new();

    for wanted in &desired.indexes {
        if let Some(live) = actual.index(&wanted.name) {
            matched.insert(live.name.as_str());
            if live.signature() != wanted.signature() {
                change_set.drop_indexes.push(live.clone());
                change_set.add_indexes.push(wanted.clone());
            }
            continue;
        }

        // same definition under another name
        let equivalent = actual.indexes.iter().find(|live| {
            !matched.contains(live.name.as_str())
                && desired.index(&live.name).is_none()
                && live.signature() == wanted.signature()
        });
        match equivalent {
            Some(live) => {
                matched.insert(live.name.as_str());
            }
            None => change_set.add_indexes.push(wanted.clone()),
        }
    }

    // a redefined index that backs a live FK can only go while the FK is released
    let redefined: Vec<IndexDescriptor> = change_set.drop_indexes.clone();
    for index in &redefined {
        let Some(leftmost) = index.columns.first() else {
            continue;
        };
        let held_by = actual.foreign_keys.iter().filter(|fk| {
            &fk.column == leftmost
                && !change_set.drops_column(&fk.column)
                && !change_set.drop_foreign_keys.iter().any(|dropped| dropped.name == fk.name)
        });
        for live in held_by.cloned().collect::<Vec<_>>() {
            tracing::debug!(
                table = %actual.name,
                index = %index.name,
                foreign_key = %live.name,
                "Releasing foreign key around index redefinition"
            );
            if !change_set.add_foreign_keys.iter().any(|fk| fk.column == live.column) {
                let recreated = desired
                    .foreign_keys
                    .iter()
                    .find(|fk| fk.column == live.column)
                    .cloned()
                    .unwrap_or_else(|| live.clone());
                change_set.add_foreign_keys.push(recreated);
            }
            change_set.drop_foreign_keys.push(live);
        }
    }

    // FKs that survive this change set need their backing index
    let kept_fk_columns: HashSet<&str> = actual
        .foreign_keys
        .iter()
        .filter(|fk| !change_set.drop_foreign_keys.iter().any(|dropped| dropped.name == fk.name))
        .map(|fk| fk.column.as_str())
        .chain(desired.foreign_keys.iter().map(|fk| fk.column.as_str()))
        .chain(change_set.add_foreign_keys.iter().map(|fk| fk.column.as_str()))
        .filter(|column| !change_set.drops_column(column))
        .collect();

    for live in &actual.indexes {
        if matched.contains(live.name.as_str()) {
            continue;
        }
        let backs_foreign_key = live
            .columns
            .first()
            .is_some_and(|leftmost| kept_fk_columns.contains(leftmost.as_str()));
        if backs_foreign_key {
            tracing::debug!(table = %actual.name, index = %live.name, "Keeping index backing a foreign key");
            continue;
        }
        change_set.drop_indexes.push(live.clone());
    }
}
