//! Error types for table_sync

use thiserror::Error;

/// Result type for table_sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table_sync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The definition block is missing or empty
    #[error("Parse error in definition for {table}: {message}")]
    Parse { table: String, message: String },

    /// A catalog query failed
    #[error("Introspection of {table} failed: {message}")]
    Introspection { table: String, message: String },

    /// A column drop is blocked by a foreign key living in another table
    #[error("Cannot drop {table}.{column}: referenced by {constraint} on {referencing_table}")]
    ConstraintDependency {
        table: String,
        column: String,
        constraint: String,
        referencing_table: String,
    },

    /// Row counts diverged after a rebuild
    #[error("Integrity check failed for {table}: expected {expected} rows, found {actual}")]
    IntegrityCheck {
        table: String,
        expected: u64,
        actual: u64,
    },

    #[error("Statement failed ({sql}): {message}")]
    StatementExecution { sql: String, message: String },

    #[error("Rebuild of {table} failed: {message}")]
    RebuildFailed { table: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Create a parse error for a table
    pub fn parse(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create an introspection error for a table
    pub fn introspection(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Introspection {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a rebuild error for a table
    pub fn rebuild(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RebuildFailed {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether the failure means the table was skipped rather than attempted
    pub fn is_skip(&self) -> bool {
        matches!(self, Error::Parse { .. } | Error::Introspection { .. })
    }
}

/// Convert Serde JSON errors to table_sync errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serialization(error.to_string())
    }
}

/// Convert YAML errors to table_sync errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::Config(error.to_string())
    }
}

/// Convert TOML deserialization errors to table_sync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
