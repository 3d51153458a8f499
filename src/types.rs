use crate::error::{ConvertError, ConvertResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// The shape of a JSON value, named the way the analysis reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Boolean => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arrays and objects never become table cells; they are extracted instead
pub fn is_complex(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

/// SQL column type tags produced by type inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    #[serde(rename = "INTEGER PRIMARY KEY")]
    IntegerPrimaryKey,
    #[serde(rename = "INTEGER")]
    Integer,
    #[serde(rename = "REAL")]
    Real,
    #[serde(rename = "BOOLEAN")]
    Boolean,
    #[serde(rename = "DATETIME")]
    Datetime,
    #[serde(rename = "VARCHAR(255)")]
    Varchar255,
    #[serde(rename = "TEXT")]
    Text,
}

impl SqlType {
    pub fn as_str(self) -> &'static str {
        match self {
            SqlType::IntegerPrimaryKey => "INTEGER PRIMARY KEY",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Datetime => "DATETIME",
            SqlType::Varchar255 => "VARCHAR(255)",
            SqlType::Text => "TEXT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One relational table; every row is aligned positionally with `columns`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    pub primary_key: String,
    #[serde(default)]
    pub column_types: BTreeMap<String, SqlType>,
}

impl Table {
    /// Create an empty table whose only column is the primary key
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Table {
            name: name.into(),
            columns: vec![primary_key.clone()],
            rows: Vec::new(),
            primary_key,
            column_types: BTreeMap::new(),
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Values of one column in row order
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().filter_map(move |row| row.get(index))
    }

    /// Look up a cell by row position and column name
    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "one-to-one")]
    OneToOne,
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationKind::ManyToOne => f.write_str("many-to-one"),
            RelationKind::OneToOne => f.write_str("one-to-one"),
        }
    }
}

/// A foreign-key link from a child table to its parent
///
/// `from` always owns the foreign key: `foreign_key` is a column of `from`
/// pointing at the primary key of `to`. This holds for `one-to-one` links
/// too, so a nested object's table is `from` and its parent is `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub foreign_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalMetadata {
    pub table_count: usize,
    pub total_rows: usize,
    pub conversion_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalModel {
    pub database_name: String,
    pub tables: Vec<Table>,
    pub relationships: Vec<Relationship>,
    pub metadata: RelationalMetadata,
}

impl RelationalModel {
    pub fn root_table(&self) -> Option<&Table> {
        self.tables.first()
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }
}

/// `_metadata` block of a document
///
/// Documents built from arrays and objects carry `createdAt`, `version` and
/// `index`; the single document wrapping a primitive carries `type` and
/// `createdAt` only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<ValueKind>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

/// A document; serializes as `{"_id": .., <fields>.., "_metadata": {..}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(rename = "_metadata")]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexSuggestion {
    Single { field: String, unique: bool },
    Composite { fields: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub name: String,
    pub documents: Vec<Document>,
    pub indexes: Vec<IndexSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_collection: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModelMetadata {
    pub collection_count: usize,
    pub total_documents: usize,
    pub conversion_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentModel {
    pub database_name: String,
    pub collections: Vec<Collection>,
    pub metadata: DocumentModelMetadata,
}

impl DocumentModel {
    pub fn root_collection(&self) -> Option<&Collection> {
        self.collections.first()
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }
}

/// What to do when source objects already carry an `id` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdCollision {
    /// Name the synthetic key `row_id_column` and keep the source `id`
    Rename,
    /// Keep the synthetic key as `id`; the source values are dropped
    DropSource,
}

/// Configuration for the conversion process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertConfig {
    /// Separator for nested table and collection names
    pub separator: String,

    /// Suffix appended to a parent table name to form the foreign key column
    pub fk_suffix: String,

    /// Suffix appended to the root name to form the database name
    pub database_suffix: String,

    /// Number of leading array elements sampled by structure analysis
    pub sample_size: usize,

    /// Maximum nesting depth to extract child tables
    pub max_depth: usize,

    /// Field coverage above which a single-field index is suggested
    pub index_coverage_threshold: f64,

    /// Policy for source `id` fields clashing with the synthetic key
    pub id_collision: IdCollision,

    /// Synthetic key name used when `id_collision` is `Rename`
    pub row_id_column: String,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        ConvertConfig {
            separator: String::from("_"),
            fk_suffix: String::from("_id"),
            database_suffix: String::from("_db"),
            sample_size: 10,
            max_depth: 64,
            index_coverage_threshold: 0.8,
            id_collision: IdCollision::Rename,
            row_id_column: String::from("_row_id"),
        }
    }
}

impl ConvertConfig {
    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConvertResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ConvertConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConvertResult<()> {
        if self.row_id_column.trim().is_empty() {
            return Err(ConvertError::invalid_input("row_id_column must not be blank"));
        }
        if !(0.0..=1.0).contains(&self.index_coverage_threshold) {
            return Err(ConvertError::invalid_input(format!(
                "index_coverage_threshold must be within 0..=1, got {}",
                self.index_coverage_threshold
            )));
        }
        Ok(())
    }

    /// Name of a table or collection nested under `parent` for `field`
    pub fn child_name(&self, parent: &str, field: &str) -> String {
        format!("{}{}{}", parent, self.separator, field)
    }

    pub fn foreign_key(&self, parent: &str) -> String {
        format!("{}{}", parent, self.fk_suffix)
    }

    pub fn database_name(&self, root: &str) -> String {
        format!("{}{}", root, self.database_suffix)
    }
}

/// Reject root names that cannot name a table or collection
pub(crate) fn check_root_name(name: &str) -> ConvertResult<()> {
    if name.trim().is_empty() {
        return Err(ConvertError::invalid_input("root name must not be blank"));
    }
    Ok(())
}
