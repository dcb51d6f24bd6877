//! Type definitions for table schema objects

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::type_map;

/// Abstract column type families understood by the definition language
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbstractType {
    TinyInteger,
    SmallInteger,
    MediumInteger,
    Integer,
    BigInteger,
    Decimal,
    Float,
    Double,
    String,
    Char,
    TinyText,
    Text,
    MediumText,
    LongText,
    Date,
    DateTime,
    Time,
    Timestamp,
    Year,
    Boolean,
    Json,
    Binary,
    Enum,
    Set,
    Uuid,
    IpAddress,
    MacAddress,
    /// Anything else; rendered verbatim
    Other(String),
}

impl AbstractType {
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            AbstractType::TinyInteger
                | AbstractType::SmallInteger
                | AbstractType::MediumInteger
                | AbstractType::Integer
                | AbstractType::BigInteger
        )
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer()
            || matches!(
                self,
                AbstractType::Decimal | AbstractType::Float | AbstractType::Double | AbstractType::Boolean
            )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            AbstractType::Date
                | AbstractType::DateTime
                | AbstractType::Time
                | AbstractType::Timestamp
                | AbstractType::Year
        )
    }
}

/// Positional type parameters
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TypeParams {
    #[default]
    None,
    Length(u32),
    Precision { precision: u32, scale: u32 },
    Values(Vec<String>),
}

/// Column default value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DefaultValue {
    Null,
    Text(String),
    /// Kept as written so `8.50` and `8.5` are both representable
    Number(String),
    Bool(bool),
    CurrentTimestamp,
}

impl DefaultValue {
    /// Render as a SQL literal
    pub fn to_sql(&self) -> String {
        match self {
            DefaultValue::Null => "NULL".to_string(),
            DefaultValue::Text(text) => format!("'{}'", text.replace('\\', "\\\\").replace('\'', "''")),
            DefaultValue::Number(number) => number.clone(),
            DefaultValue::Bool(flag) => if *flag { "1" } else { "0" }.to_string(),
            DefaultValue::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: AbstractType,
    pub params: TypeParams,
    pub unsigned: bool,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub comment: Option<String>,
    /// Position hint: place after this column when added
    pub after: Option<String>,
    pub auto_increment: bool,
    pub primary_key: bool,
    /// Native type string as reported by the catalog; unset for parsed columns
    pub native: Option<String>,
}

impl ColumnDescriptor {
    /// Create a new NOT NULL column with the given name and type
    pub fn new(name: &str, column_type: AbstractType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            params: TypeParams::None,
            unsigned: false,
            nullable: false,
            default: None,
            comment: None,
            after: None,
            auto_increment: false,
            primary_key: false,
            native: None,
        }
    }

    pub fn params(mut self, params: TypeParams) -> Self {
        self.params = params;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }

    /// Native column type; the catalog's string when introspected
    pub fn native_type(&self) -> String {
        match &self.native {
            Some(native) => native.clone(),
            None => type_map::to_native_type(&self.column_type, &self.params, self.unsigned),
        }
    }
}

/// Index kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Unique,
    Normal,
    Spatial,
}

impl IndexKind {
    /// Prefix used for generated index names
    pub fn name_prefix(self) -> &'static str {
        match self {
            IndexKind::Unique => "unique",
            IndexKind::Normal => "index",
            IndexKind::Spatial => "spatial",
        }
    }
}

/// Represents an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub kind: IndexKind,
    /// Creation order; only sorted for comparison
    pub columns: Vec<String>,
}

impl IndexDescriptor {
    pub fn new(name: &str, kind: IndexKind, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns,
        }
    }

    /// Kind plus sorted column set
    pub fn signature(&self) -> (IndexKind, Vec<String>) {
        let mut columns = self.columns.clone();
        columns.sort();
        (self.kind, columns)
    }
}

/// Referential actions for foreign keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    SetNull,
    #[default]
    Restrict,
    NoAction,
}

impl ReferentialAction {
    /// Parse a catalog or definition spelling; unknown values fall back to restrict
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().replace(['_', '-'], " ").as_str() {
            "cascade" => ReferentialAction::Cascade,
            "set null" | "null" => ReferentialAction::SetNull,
            "no action" => ReferentialAction::NoAction,
            _ => ReferentialAction::Restrict,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Spelling used in definition text
    pub fn as_definition(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "cascade",
            ReferentialAction::SetNull => "set null",
            ReferentialAction::Restrict => "restrict",
            ReferentialAction::NoAction => "no action",
        }
    }
}

/// Represents a single-column foreign key constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDescriptor {
    pub name: String,
    /// Owning table
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKeyDescriptor {
    /// Same target and actions, ignoring the constraint name
    pub fn same_definition(&self, other: &ForeignKeyDescriptor) -> bool {
        self.column == other.column
            && self.referenced_table == other.referenced_table
            && self.referenced_column == other.referenced_column
            && self.on_delete == other.on_delete
            && self.on_update == other.on_update
    }
}

/// Represents a database table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub indexes: Vec<IndexDescriptor>,
    pub foreign_keys: Vec<ForeignKeyDescriptor>,
    pub has_timestamps: bool,
    pub has_soft_deletes: bool,
    /// Column declared through `softDeletes`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_deletes_column: Option<String>,
}

impl TableSchema {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            has_timestamps: false,
            has_soft_deletes: false,
            soft_deletes_column: None,
        }
    }

    /// Add a column, replacing any earlier column with the same name
    pub fn add_column(&mut self, column: ColumnDescriptor) {
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == column.name) {
            *existing = column;
        } else {
            self.columns.push(column);
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn index(&self, name: &str) -> Option<&IndexDescriptor> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Primary key columns in table order
    pub fn primary_key(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_column_replaces_same_name() {
        let mut table = TableSchema::new("users");
        table.add_column(ColumnDescriptor::new("email", AbstractType::String));
        table.add_column(ColumnDescriptor::new("email", AbstractType::Text).nullable(true));

        assert_eq!(table.columns.len(), 1);
        assert_eq!(table.columns[0].column_type, AbstractType::Text);
        assert!(table.columns[0].nullable);
    }

    #[test]
    fn test_index_signature_sorts_columns() {
        let index = IndexDescriptor::new(
            "unique_slug_tenant",
            IndexKind::Unique,
            vec!["tenant_id".to_string(), "slug".to_string()],
        );
        assert_eq!(
            index.signature(),
            (IndexKind::Unique, vec!["slug".to_string(), "tenant_id".to_string()])
        );
        assert_eq!(index.columns[0], "tenant_id");
    }

    #[test]
    fn test_referential_action_spellings() {
        assert_eq!(ReferentialAction::parse("CASCADE"), ReferentialAction::Cascade);
        assert_eq!(ReferentialAction::parse("set null"), ReferentialAction::SetNull);
        assert_eq!(ReferentialAction::parse("NO ACTION"), ReferentialAction::NoAction);
        assert_eq!(ReferentialAction::parse("whatever"), ReferentialAction::Restrict);
    }

    #[test]
    fn test_default_value_sql() {
        assert_eq!(DefaultValue::Text("it's".to_string()).to_sql(), "'it''s'");
        assert_eq!(DefaultValue::Bool(true).to_sql(), "1");
        assert_eq!(DefaultValue::CurrentTimestamp.to_sql(), "CURRENT_TIMESTAMP");
    }
}
