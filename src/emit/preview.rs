//! Side-by-side summary of a value and both of its conversions

use crate::types::{Collection, DocumentModel, RelationalModel, Table, ValueKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginalSummary {
    #[serde(rename = "type")]
    pub kind: ValueKind,
    /// Length in bytes of the compact JSON text
    pub size: usize,
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalSummary {
    pub table_count: usize,
    pub total_rows: usize,
    pub relationships: usize,
    pub main_table: Option<String>,
    /// The whole root table, filled by [`preview_detailed`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_table: Option<Table>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub collection_count: usize,
    pub total_documents: usize,
    pub indexes: usize,
    pub main_collection: Option<String>,
    /// The whole root collection, filled by [`preview_detailed`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_collection: Option<Collection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub original: OriginalSummary,
    pub sql: RelationalSummary,
    pub nosql: DocumentSummary,
}

/// Counts and root names for both conversions of `value`
pub fn preview(value: &Value, relational: &RelationalModel, document: &DocumentModel) -> Preview {
    let item_count = match value {
        Value::Array(items) => items.len(),
        _ => 1,
    };

    Preview {
        original: OriginalSummary {
            kind: ValueKind::of(value),
            size: value.to_string().len(),
            item_count,
        },
        sql: RelationalSummary {
            table_count: relational.tables.len(),
            total_rows: relational.metadata.total_rows,
            relationships: relational.relationships.len(),
            main_table: relational.root_table().map(|t| t.name.clone()),
            root_table: None,
        },
        nosql: DocumentSummary {
            collection_count: document.collections.len(),
            total_documents: document.metadata.total_documents,
            indexes: document.collections.iter().map(|c| c.indexes.len()).sum(),
            main_collection: document.root_collection().map(|c| c.name.clone()),
            root_collection: None,
        },
    }
}

/// Like [`preview`], but also embeds the root table and root collection
pub fn preview_detailed(
    value: &Value,
    relational: &RelationalModel,
    document: &DocumentModel,
) -> Preview {
    let mut summary = preview(value, relational, document);
    summary.sql.root_table = relational.root_table().cloned();
    summary.nosql.root_collection = document.root_collection().cloned();
    summary
}
