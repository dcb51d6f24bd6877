//! Naming utilities for table_sync
//!
//! Identifier quoting, generated index/constraint/table names and the
//! protected-column alias table.

use chrono::Utc;
use inflector::Inflector;
use std::collections::HashSet;

use crate::schema::types::IndexKind;

/// MySQL identifier length limit
pub const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Pattern for generated foreign key constraint names
pub const FOREIGN_KEY_PATTERN: &str = "{table}_{column}_foreign";

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Format a name according to a pattern with placeholders
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = pattern.to_string();

    for (placeholder, value) in replacements {
        result = result.replace(&format!("{{{}}}", placeholder), value);
    }

    result
}

/// Deterministic index name from kind and columns in declaration order
pub fn generate_index_name(kind: IndexKind, columns: &[String]) -> String {
    truncate_identifier(
        &format!("{}_{}", kind.name_prefix(), columns.join("_")),
        MAX_IDENTIFIER_LENGTH,
    )
}

/// Get foreign key constraint name according to pattern
pub fn get_foreign_key_name(pattern: &str, table_name: &str, column_name: &str) -> String {
    truncate_identifier(
        &format_name(pattern, &[("table", table_name), ("column", column_name)]),
        MAX_IDENTIFIER_LENGTH,
    )
}

/// Truncate an identifier to fit database limits
pub fn truncate_identifier(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        name.to_string()
    } else {
        // 8 hash chars plus the underscore
        let keep_length = max_length.saturating_sub(9);
        let hash = format!("{:x}", md5::compute(name.as_bytes()));

        let mut cut = keep_length.min(name.len());
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }

        format!("{}_{}", &name[..cut], &hash[0..8])
    }
}

/// Name for the structural clone used during a rebuild
pub fn clone_table_name(table: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    truncate_identifier(&format!("{}_sync_{}", table, &suffix[..8]), MAX_IDENTIFIER_LENGTH)
}

/// Name for the backup of the original table during a rebuild
pub fn backup_table_name(table: &str) -> String {
    let now = Utc::now();
    truncate_identifier(
        &format!("{}_backup_{}", table, now.format("%Y%m%d%H%M%S")),
        MAX_IDENTIFIER_LENGTH,
    )
}

/// Convert a singular name to plural
pub fn pluralize(name: &str) -> String {
    match name.to_lowercase().as_str() {
        "person" => "people".to_string(),
        "child" => "children".to_string(),
        _ => name.to_plural(),
    }
}

/// Table referenced by a `*_id` column, e.g. `category_id` -> `categories`
pub fn guess_referenced_table(column: &str) -> String {
    let stem = column.strip_suffix("_id").unwrap_or(column);
    pluralize(stem)
}

/// Derive a table name from a definition file stem
///
/// `2024_01_05_120000_create_order_items_table` becomes `order_items`.
pub fn table_name_from_file_stem(stem: &str) -> String {
    let words: Vec<&str> = stem
        .split('_')
        .skip_while(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
        .collect();
    let mut name = words.join("_");

    if let Some(rest) = name.strip_prefix("create_") {
        name = rest.to_string();
    }
    if let Some(rest) = name.strip_suffix("_table") {
        name = rest.to_string();
    }

    name.to_snake_case()
}

/// Canonical protected column names
pub const CANONICAL_PROTECTED: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

/// Recognized aliases of the canonical timestamp and soft-delete columns
pub const PROTECTED_ALIASES: &[&str] = &[
    "created",
    "creation_date",
    "date_created",
    "updated",
    "modified",
    "modification_date",
    "date_modified",
    "last_modified",
    "deleted",
    "deletion_date",
    "date_deleted",
];

/// Column names that are never dropped
#[derive(Debug, Clone)]
pub struct ProtectedColumns {
    names: HashSet<String>,
}

impl Default for ProtectedColumns {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl ProtectedColumns {
    /// Canonical names and aliases plus configured extras
    pub fn new(extra: &[String]) -> Self {
        let names = CANONICAL_PROTECTED
            .iter()
            .chain(PROTECTED_ALIASES.iter())
            .map(|name| name.to_string())
            .chain(extra.iter().map(|name| name.to_lowercase()))
            .collect();
        Self { names }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.names.contains(&column.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "`users`");
        assert_eq!(quote_ident("we`ird"), "`we``ird`");
    }

    #[test]
    fn test_format_name() {
        assert_eq!(
            format_name(FOREIGN_KEY_PATTERN, &[("table", "posts"), ("column", "author_id")]),
            "posts_author_id_foreign"
        );
    }

    #[test]
    fn test_index_name_keeps_declared_order() {
        let columns = vec!["tenant_id".to_string(), "slug".to_string()];
        assert_eq!(generate_index_name(IndexKind::Unique, &columns), "unique_tenant_id_slug");
        assert_eq!(
            generate_index_name(IndexKind::Normal, &["email".to_string()]),
            "index_email"
        );
    }

    #[test]
    fn test_truncate_identifier() {
        let long = "a".repeat(80);
        let truncated = truncate_identifier(&long, 64);
        assert_eq!(truncated.len(), 64);
        assert_eq!(truncated, truncate_identifier(&long, 64));
        assert_eq!(truncate_identifier("short", 64), "short");
    }

    #[test]
    fn test_rebuild_table_names() {
        let clone = clone_table_name("orders");
        assert!(clone.starts_with("orders_sync_"));
        assert_eq!(clone.len(), "orders_sync_".len() + 8);
        assert!(backup_table_name("orders").starts_with("orders_backup_"));
        assert!(clone_table_name(&"t".repeat(70)).len() <= MAX_IDENTIFIER_LENGTH);
    }

    #[test]
    fn test_guess_referenced_table() {
        assert_eq!(guess_referenced_table("category_id"), "categories");
        assert_eq!(guess_referenced_table("user_id"), "users");
        assert_eq!(guess_referenced_table("person_id"), "people");
    }

    #[test]
    fn test_table_name_from_file_stem() {
        assert_eq!(
            table_name_from_file_stem("2024_01_05_120000_create_order_items_table"),
            "order_items"
        );
        assert_eq!(table_name_from_file_stem("products"), "products");
        assert_eq!(table_name_from_file_stem("OrderItems"), "order_items");
    }

    #[test]
    fn test_protected_columns() {
        let protected = ProtectedColumns::new(&["legacy_id".to_string()]);
        for name in ["id", "created_at", "updated_at", "deleted_at", "creation_date", "Created", "legacy_id"] {
            assert!(protected.contains(name), "{} should be protected", name);
        }
        assert!(!protected.contains("email"));
    }
}
