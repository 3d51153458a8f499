//! Identity and blob storage collaborators
//!
//! Converted artifacts can be handed to an owner-scoped blob store. The real
//! identity provider and storage backend live outside this crate; the traits
//! here are the seam, and [`MemoryBlobStore`] backs tests and the CLIs.

use crate::clock::{Clock, SystemClock};
use crate::emit::{render_inserts, render_schema};
use crate::error::{ConvertError, ConvertResult};
use crate::types::{DocumentModel, RelationalModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

pub const SQL_CATEGORY: &str = "sql";
pub const NOSQL_CATEGORY: &str = "nosql";

/// Opaque identifier of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            display_name: None,
        }
    }
}

pub trait IdentityProvider {
    fn current_user(&self) -> Option<Identity>;
}

/// Identity provider that always answers with the same user, or nobody
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<Identity>);

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<Identity> {
        self.0.clone()
    }
}

/// Bytes to store plus the name and media type they are filed under
#[derive(Debug, Clone, PartialEq)]
pub struct Blob {
    pub name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn text(name: impl Into<String>, content_type: impl Into<String>, text: String) -> Self {
        Blob {
            name: name.into(),
            content_type: content_type.into(),
            data: text.into_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: FileId,
    pub owner: String,
    pub name: String,
    pub content_type: String,
    pub category: String,
    pub size: usize,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub record: FileRecord,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub total_files: usize,
    pub total_size: usize,
    pub by_category: BTreeMap<String, usize>,
}

/// Owner-scoped file storage
pub trait BlobStore {
    fn store(
        &mut self,
        owner: &str,
        blob: Blob,
        category: &str,
        metadata: Map<String, Value>,
    ) -> ConvertResult<FileId>;

    /// Records owned by `owner`, oldest first
    fn list_files(&self, owner: &str) -> ConvertResult<Vec<FileRecord>>;

    fn get_file(&self, id: &FileId) -> ConvertResult<StoredFile>;

    fn delete_file(&mut self, id: &FileId) -> ConvertResult<()>;
}

/// Blob store kept in process memory
pub struct MemoryBlobStore {
    files: BTreeMap<FileId, StoredFile>,
    next_id: u64,
    clock: Box<dyn Clock>,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        MemoryBlobStore {
            files: BTreeMap::new(),
            next_id: 0,
            clock,
        }
    }

    /// Files of `owner` whose name contains `query`, ignoring case
    pub fn search(&self, owner: &str, query: &str) -> Vec<FileRecord> {
        let query = query.to_lowercase();
        self.owned_by(owner)
            .filter(|file| file.record.name.to_lowercase().contains(&query))
            .map(|file| file.record.clone())
            .collect()
    }

    pub fn stats(&self, owner: &str) -> StorageStats {
        let mut stats = StorageStats::default();
        for file in self.owned_by(owner) {
            stats.total_files += 1;
            stats.total_size += file.record.size;
            *stats
                .by_category
                .entry(file.record.category.clone())
                .or_insert(0) += 1;
        }
        stats
    }

    fn owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a StoredFile> + 'a {
        self.files.values().filter(move |file| file.record.owner == owner)
    }
}

impl BlobStore for MemoryBlobStore {
    fn store(
        &mut self,
        owner: &str,
        blob: Blob,
        category: &str,
        metadata: Map<String, Value>,
    ) -> ConvertResult<FileId> {
        if owner.trim().is_empty() {
            return Err(ConvertError::invalid_input("file owner must not be blank"));
        }

        self.next_id += 1;
        // Zero-padded so the map iterates in insertion order
        let id = FileId(format!("file_{:08}", self.next_id));

        let record = FileRecord {
            id: id.clone(),
            owner: owner.to_string(),
            name: blob.name,
            content_type: blob.content_type,
            category: category.to_string(),
            size: blob.data.len(),
            metadata,
            created_at: self.clock.now(),
        };
        debug!(id = %id, owner, category, size = record.size, "stored file");

        self.files.insert(
            id.clone(),
            StoredFile {
                record,
                data: blob.data,
            },
        );
        Ok(id)
    }

    fn list_files(&self, owner: &str) -> ConvertResult<Vec<FileRecord>> {
        Ok(self.owned_by(owner).map(|file| file.record.clone()).collect())
    }

    fn get_file(&self, id: &FileId) -> ConvertResult<StoredFile> {
        self.files
            .get(id)
            .cloned()
            .ok_or_else(|| ConvertError::NotFound(id.clone()))
    }

    fn delete_file(&mut self, id: &FileId) -> ConvertResult<()> {
        self.files
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ConvertError::NotFound(id.clone()))
    }
}

/// Human readable size, e.g. "0 Bytes", "1.5 KB", "2 GB"
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Store the rendered forms of the given models for the signed-in user
///
/// The relational model is filed as `<name>_schema.sql` and
/// `<name>_inserts.sql` under the `sql` category; the document model as
/// `<name>_documents.json` under `nosql`.
pub fn publish_artifacts(
    identity: &dyn IdentityProvider,
    store: &mut dyn BlobStore,
    name: &str,
    relational: Option<&RelationalModel>,
    document: Option<&DocumentModel>,
) -> ConvertResult<Vec<FileId>> {
    let user = identity.current_user().ok_or(ConvertError::Unauthenticated)?;
    let mut stored = Vec::new();

    if let Some(model) = relational {
        let metadata = as_map(json!({
            "databaseName": model.database_name,
            "tableCount": model.metadata.table_count,
            "totalRows": model.metadata.total_rows,
        }));

        stored.push(store.store(
            &user.user_id,
            Blob::text(format!("{}_schema.sql", name), "application/sql", render_schema(model)),
            SQL_CATEGORY,
            metadata.clone(),
        )?);
        stored.push(store.store(
            &user.user_id,
            Blob::text(format!("{}_inserts.sql", name), "application/sql", render_inserts(model)),
            SQL_CATEGORY,
            metadata,
        )?);
    }

    if let Some(model) = document {
        let metadata = as_map(json!({
            "databaseName": model.database_name,
            "collectionCount": model.metadata.collection_count,
            "totalDocuments": model.metadata.total_documents,
        }));

        stored.push(store.store(
            &user.user_id,
            Blob::text(
                format!("{}_documents.json", name),
                "application/json",
                serde_json::to_string_pretty(model)?,
            ),
            NOSQL_CATEGORY,
            metadata,
        )?);
    }

    info!(user = %user.user_id, files = stored.len(), "published artifacts");
    Ok(stored)
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
