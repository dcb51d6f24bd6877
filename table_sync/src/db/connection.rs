//! Database connection handling
//!
//! The [`Database`] trait is the seam between the synchronization engine and a
//! live server. [`DatabaseConnection`] implements it over a MySQL pool.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::db::catalog::{ColumnRow, ForeignKeyRow, IndexRow};
use crate::db::statement::Statement;
use crate::error::{Error, Result};

/// Catalog queries and statement execution against one schema
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement, returning the number of affected rows
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    async fn table_exists(&self, table: &str) -> Result<bool>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Columns in ordinal order
    async fn column_rows(&self, table: &str) -> Result<Vec<ColumnRow>>;

    /// Index columns, `PRIMARY` included
    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>>;

    /// Foreign keys owned by `table`
    async fn foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>>;

    /// Foreign keys in other tables that reference `table`
    async fn referencing_foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>>;
}

/// MySQL connection pool scoped to a catalog schema
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: MySqlPool,
    schema: Option<String>,
}

const COLUMNS_SQL: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(COLUMN_TYPE AS CHAR) AS column_type,
        CAST(IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
        CAST(COLUMN_COMMENT AS CHAR) AS column_comment,
        CAST(COLUMN_KEY AS CHAR) AS column_key,
        CAST(EXTRA AS CHAR) AS extra
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const INDEXES_SQL: &str = r#"
    SELECT
        CAST(INDEX_NAME AS CHAR) AS index_name,
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(NON_UNIQUE AS SIGNED) AS non_unique,
        CAST(SEQ_IN_INDEX AS SIGNED) AS seq_in_index,
        CAST(INDEX_TYPE AS CHAR) AS index_type
    FROM information_schema.STATISTICS
    WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?
    ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

const FOREIGN_KEY_COLUMNS: &str = r#"
    SELECT
        CAST(k.CONSTRAINT_NAME AS CHAR) AS constraint_name,
        CAST(k.TABLE_NAME AS CHAR) AS table_name,
        CAST(k.COLUMN_NAME AS CHAR) AS column_name,
        CAST(k.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table,
        CAST(k.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column,
        CAST(r.DELETE_RULE AS CHAR) AS delete_rule,
        CAST(r.UPDATE_RULE AS CHAR) AS update_rule
    FROM information_schema.KEY_COLUMN_USAGE k
    JOIN information_schema.REFERENTIAL_CONSTRAINTS r
        ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
        AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
        AND r.TABLE_NAME = k.TABLE_NAME
"#;

impl DatabaseConnection {
    /// Create a new database connection from configuration
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool_size = config.pool_size.unwrap_or(10);
        let timeout_seconds = config.timeout_seconds.unwrap_or(30);

        let pool = MySqlPoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_secs(timeout_seconds))
            .connect(&config.url)
            .await?;

        tracing::debug!(pool_size, schema = ?config.schema, "Connected to database");

        Ok(Self {
            pool,
            schema: config.schema.clone(),
        })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: MySqlPool, schema: Option<String>) -> Self {
        Self { pool, schema }
    }

    /// Catalog schema, `None` for the connection's current database
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    async fn fetch_foreign_keys(&self, filter: &str, table: &str) -> Result<Vec<ForeignKeyRow>> {
        let sql = format!(
            "{} WHERE {} ORDER BY k.TABLE_NAME, k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
            FOREIGN_KEY_COLUMNS, filter
        );
        sqlx::query_as::<_, ForeignKeyRow>(&sql)
            .bind(self.schema())
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::introspection(table, e.to_string()))
    }
}

#[async_trait]
impl Database for DatabaseConnection {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let sql = statement.to_sql();
        let result = sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::StatementExecution {
                sql: sql.clone(),
                message: e.to_string(),
            })?;
        Ok(result.rows_affected())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES WHERE TABLE_SCHEMA = COALESCE(?, DATABASE()) AND TABLE_NAME = ?",
        )
        .bind(self.schema())
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::introspection(table, e.to_string()))?;
        Ok(count > 0)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}",
            crate::utils::naming::quote_ident(table)
        );
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count.max(0) as u64)
    }

    async fn column_rows(&self, table: &str) -> Result<Vec<ColumnRow>> {
        sqlx::query_as::<_, ColumnRow>(COLUMNS_SQL)
            .bind(self.schema())
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::introspection(table, e.to_string()))
    }

    async fn index_rows(&self, table: &str) -> Result<Vec<IndexRow>> {
        sqlx::query_as::<_, IndexRow>(INDEXES_SQL)
            .bind(self.schema())
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::introspection(table, e.to_string()))
    }

    async fn foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        self.fetch_foreign_keys(
            "k.TABLE_SCHEMA = COALESCE(?, DATABASE()) AND k.TABLE_NAME = ? AND k.REFERENCED_TABLE_NAME IS NOT NULL",
            table,
        )
        .await
    }

    async fn referencing_foreign_key_rows(&self, table: &str) -> Result<Vec<ForeignKeyRow>> {
        // self-references are reported as owned keys
        self.fetch_foreign_keys(
            "k.REFERENCED_TABLE_SCHEMA = COALESCE(?, DATABASE()) AND k.REFERENCED_TABLE_NAME = ? AND k.TABLE_NAME <> k.REFERENCED_TABLE_NAME",
            table,
        )
        .await
    }
}
