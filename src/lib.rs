//! # Smelter - JSON Structure Analysis and Schema Conversion
//!
//! Turns arbitrary JSON into two storage-ready shapes: a relational model
//! (tables, rows, foreign keys, SQL column types) and a document model
//! (collections, documents with generated ids, suggested indexes).
//!
//! ## Modules
//!
//! - **analyze**: Classify the shape of a value and recommend a storage model
//! - **relational**: Extract nested JSON into linked tables and infer column types
//! - **document**: Wrap JSON as documents, lift embedded collections, suggest indexes
//! - **emit**: Render `CREATE TABLE`/`INSERT` text and side-by-side previews
//! - **storage**: Identity and blob-store seams for publishing artifacts
//!
//! ## Quick Start
//!
//! ### Relational Conversion
//!
//! ```rust
//! use smelter::{render_schema, ConvertConfig, RelationalConverter};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = json!({
//!     "name": "Alice",
//!     "posts": [
//!         {"title": "First Post"},
//!         {"title": "Second Post"}
//!     ]
//! });
//!
//! let converter = RelationalConverter::new(ConvertConfig::default());
//! let model = converter.convert(&data, "users")?;
//!
//! // tables[0] = users (id, name)
//! // tables[1] = users_posts (id, title, users_id)
//! assert_eq!(model.tables.len(), 2);
//! println!("{}", render_schema(&model));
//! # Ok(())
//! # }
//! ```
//!
//! ### Document Conversion
//!
//! ```rust
//! use smelter::{ConvertConfig, DocumentConverter};
//! use serde_json::json;
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = json!([{"userId": 1, "createdAt": "2024-01-01"}, {"userId": 2}]);
//!
//! let converter = DocumentConverter::new(ConvertConfig::default());
//! let model = converter.convert(&data, "events")?;
//!
//! // every element is a document with `_id` and `_metadata`
//! assert_eq!(model.metadata.total_documents, 2);
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use tracing::debug;

pub mod analyze;
pub mod clock;
pub mod document;
pub mod emit;
pub mod error;
pub mod input;
pub mod relational;
pub mod storage;
pub mod types;
pub mod writer;

// Re-export commonly used types for convenience
pub use analyze::{StructureAnalysis, StructureAnalyzer};
pub use document::{suggest_indexes, DocumentConverter};
pub use emit::{preview, preview_detailed, render_inserts, render_schema, Preview};
pub use error::{ConvertError, ConvertResult};
pub use relational::RelationalConverter;
pub use types::{
    Collection, ConvertConfig, Document, DocumentModel, IdCollision, IndexSuggestion,
    RelationalModel, SqlType, Table,
};
pub use writer::{ModelWriter, SingleWriter};

/// Everything derived from one JSON input
#[derive(Debug, Clone, Serialize)]
pub struct Conversion {
    pub analysis: StructureAnalysis,
    pub relational: RelationalModel,
    pub document: DocumentModel,
    pub preview: Preview,
}

/// Main entry point: read JSON (or NDJSON) and convert it both ways
pub fn convert_json<R: Read>(
    reader: R,
    ndjson: bool,
    name: &str,
    config: ConvertConfig,
) -> Result<Conversion> {
    config.validate().context("Invalid configuration")?;

    let value = input::read_json(reader, ndjson).context("Failed to parse JSON")?;

    let analysis = StructureAnalyzer::new(config.sample_size).analyze(&value);
    debug!(kind = %analysis.kind, depth = analysis.depth, "analyzed input");

    let relational = RelationalConverter::new(config.clone())
        .convert(&value, name)
        .context("Relational conversion failed")?;
    let document = DocumentConverter::new(config)
        .convert(&value, name)
        .context("Document conversion failed")?;

    let preview = preview(&value, &relational, &document);

    Ok(Conversion {
        analysis,
        relational,
        document,
        preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_json_end_to_end() {
        let input = r#"[
            {"id": "x", "email": "a@b.com", "orders": [{"total": 9.5}, {"total": 3}]},
            {"id": "y", "email": "c@d.org", "orders": [{"total": 1}]}
        ]"#;

        let conversion = convert_json(input.as_bytes(), false, "customers", ConvertConfig::default()).unwrap();

        let root = conversion.relational.root_table().unwrap();
        assert_eq!(root.primary_key, "_row_id");
        assert_eq!(root.columns, vec!["_row_id", "id", "email"]);
        assert_eq!(root.column_types["email"], SqlType::Varchar255);

        let orders = conversion.relational.table("customers_orders").unwrap();
        assert_eq!(orders.rows.len(), 3);
        assert_eq!(orders.column_types["total"], SqlType::Real);

        assert_eq!(conversion.document.collections.len(), 2);
        assert_eq!(conversion.preview.original.item_count, 2);
        assert_eq!(conversion.preview.sql.relationships, 1);
    }

    #[test]
    fn test_convert_ndjson() {
        let input = "{\"a\": 1}\n{\"a\": 2}\n";
        let conversion = convert_json(input.as_bytes(), true, "rows", ConvertConfig::default()).unwrap();
        assert_eq!(conversion.relational.metadata.total_rows, 2);
        assert_eq!(conversion.document.metadata.total_documents, 2);
    }

    #[test]
    fn test_convert_rejects_blank_name() {
        assert!(convert_json("{}".as_bytes(), false, " ", ConvertConfig::default()).is_err());
    }
}
