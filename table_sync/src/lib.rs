//! table_sync: keeps live MySQL tables in line with schema-definition files
//!
//! Each definition file describes one table. table_sync parses it, reads the
//! live table from the catalog, computes the difference and applies it either
//! in place or through a clone-and-swap rebuild that preserves every row and
//! every foreign key pointing at the table.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod sync;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::{Database, DatabaseConnection};
pub use error::{Error, Result};
pub use schema::diff::ChangeSet;
pub use schema::risk::Strategy;
pub use sync::{SyncSummary, Synchronizer, TableDefinition, TableOutcome};

/// Initialize table_sync with the specified configuration file
pub async fn init(config_path: &str) -> Result<SyncClient> {
    let config = config::load_from_file(config_path)?;
    SyncClient::new(config).await
}

/// The main client for interacting with table_sync
pub struct SyncClient {
    config: Config,
    db_connection: DatabaseConnection,
}

impl SyncClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.database).await?;
        Ok(Self { config, db_connection })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load the definition files named by the configuration
    pub fn load_definitions(&self) -> Result<Vec<TableDefinition>> {
        sync::load_definitions(&self.config.sync)
    }

    /// Synchronize the given definitions
    pub async fn sync_definitions(&self, definitions: &[TableDefinition]) -> SyncSummary {
        if self.config.sync.dry_run {
            tracing::info!("Dry run: statements are logged, not applied");
        }
        Synchronizer::new(&self.db_connection, &self.config.sync, &self.config.type_mapping)
            .sync_all(definitions)
            .await
    }

    /// Complete workflow: load definitions, then synchronize every table
    pub async fn sync(&self) -> Result<SyncSummary> {
        let definitions = self.load_definitions()?;
        if definitions.is_empty() {
            tracing::warn!(dir = %self.config.sync.definitions_dir, "No definition files found");
        }
        Ok(self.sync_definitions(&definitions).await)
    }
}
