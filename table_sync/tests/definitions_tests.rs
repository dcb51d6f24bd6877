mod common;

use pretty_assertions::assert_eq;
use std::fs;

use common::{column, column_with_default, id_column, MockDatabase};
use table_sync::config::SyncConfig;
use table_sync::error::Error;
use table_sync::schema::{diff, parse_definition, to_definition, DiffContext, SchemaAnalyzer, TypeMapper};
use table_sync::sync::load_definitions;
use table_sync::utils::ProtectedColumns;

fn config_for(dir: &std::path::Path) -> SyncConfig {
    SyncConfig {
        definitions_dir: dir.to_str().unwrap().to_string(),
        ..SyncConfig::default()
    }
}

#[test]
fn test_load_definitions_walks_the_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("2024_01_05_120000_create_orders_table.schema"),
        "Schema::create('orders', function (Blueprint $table) {\n    $table->id();\n});\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("2024_02_01_000000_create_order_items_table.schema"),
        "// not written yet\n",
    )
    .unwrap();
    fs::create_dir(dir.path().join("billing")).unwrap();
    fs::write(
        dir.path().join("billing").join("invoices.schema"),
        "Schema::create('invoices', function (Blueprint $table) {\n    $table->id();\n});\n",
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "not a definition").unwrap();

    let definitions = load_definitions(&config_for(dir.path())).unwrap();

    let tables: Vec<&str> = definitions.iter().map(|d| d.table.as_str()).collect();
    assert_eq!(tables, vec!["invoices", "order_items", "orders"]);
    assert!(definitions[2].text.contains("$table->id();"));
    assert!(definitions[0].source.as_ref().unwrap().ends_with("billing/invoices.schema"));
}

#[test]
fn test_duplicate_tables_keep_the_first_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("a_orders.schema"),
        "Schema::create('orders', function (Blueprint $table) {\n    $table->id();\n});\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("b_orders.schema"),
        "Schema::create('orders', function (Blueprint $table) {\n    $table->uuid('id');\n});\n",
    )
    .unwrap();

    let definitions = load_definitions(&config_for(dir.path())).unwrap();

    assert_eq!(definitions.len(), 1);
    assert!(definitions[0].source.as_ref().unwrap().ends_with("a_orders.schema"));
}

#[test]
fn test_missing_directory_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_definitions(&config_for(&dir.path().join("absent"))).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_rendered_live_table_diffs_clean() {
    let db = MockDatabase::new();
    db.add_table("customers", vec![id_column()], 1);
    db.add_table(
        "orders",
        vec![
            id_column(),
            column("customer_id", "bigint(20) unsigned", false),
            column_with_default("total", "decimal(10,2)", false, "0.00"),
            column_with_default("status", "varchar(20)", false, "pending"),
            column("reference", "varchar(40)", true),
        ],
        4,
    );
    db.add_index("orders", "unique_reference", true, &["reference"]);
    db.add_foreign_key("orders", "orders_customer_id_foreign", "customer_id", "customers", "id");

    let actual = SchemaAnalyzer::new(&db).analyze_table("orders").await.unwrap();
    let text = format!(
        "Schema::create('orders', function (Blueprint $table) {{\n{}}});\n",
        to_definition(&actual)
    );
    let desired = parse_definition("orders", &text).unwrap();
    assert!(desired.unparsed.is_empty(), "{:?}", desired.unparsed);

    let mapper = TypeMapper::default();
    let protected = ProtectedColumns::default();
    let change_set = diff(
        &desired.schema,
        &actual,
        &DiffContext {
            mapper: &mapper,
            protected: &protected,
        },
    );
    assert!(change_set.is_empty(), "{:?}", change_set);
}
