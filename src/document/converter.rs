use crate::clock::{object_id, Clock, RandomSource, SystemClock, ThreadRandom};
use crate::document::indexes::suggest_indexes_with_threshold;
use crate::error::ConvertResult;
use crate::types::{
    check_root_name, Collection, ConvertConfig, Document, DocumentMetadata, DocumentModel,
    DocumentModelMetadata, ValueKind,
};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use tracing::debug;

const RESERVED_FIELDS: [&str; 2] = ["_id", "_metadata"];

/// Converts JSON values into collections of documents
pub struct DocumentConverter {
    config: ConvertConfig,
    clock: Box<dyn Clock>,
    random: RefCell<Box<dyn RandomSource>>,
}

impl DocumentConverter {
    pub fn new(config: ConvertConfig) -> Self {
        Self::with_sources(config, Box::new(SystemClock), Box::new(ThreadRandom::default()))
    }

    /// Create a converter with explicit time and randomness, e.g. for reproducible output
    pub fn with_sources(
        config: ConvertConfig,
        clock: Box<dyn Clock>,
        random: Box<dyn RandomSource>,
    ) -> Self {
        DocumentConverter {
            config,
            clock,
            random: RefCell::new(random),
        }
    }

    /// Convert a JSON value into a document model rooted at `collection_name`
    pub fn convert(&self, value: &Value, collection_name: &str) -> ConvertResult<DocumentModel> {
        check_root_name(collection_name)?;

        let mut collections = Vec::new();
        match value {
            Value::Array(items) => {
                let documents: Vec<Document> = items
                    .iter()
                    .enumerate()
                    .map(|(index, item)| self.make_document(item, index))
                    .collect();
                collections.push(self.collection(collection_name, documents, None));
            }
            Value::Object(_) => {
                let documents = vec![self.make_document(value, 0)];
                collections.push(self.collection(collection_name, documents, None));
            }
            primitive => {
                collections.push(Collection {
                    name: collection_name.to_string(),
                    documents: vec![self.primitive_document(primitive)],
                    indexes: Vec::new(),
                    parent_collection: None,
                });
            }
        }

        self.extract_embedded_collections(value, collection_name, &mut collections);

        let total_documents: usize = collections.iter().map(|c| c.documents.len()).sum();
        debug!(
            root = collection_name,
            collections = collections.len(),
            total_documents,
            "document conversion complete"
        );

        Ok(DocumentModel {
            database_name: self.config.database_name(collection_name),
            metadata: DocumentModelMetadata {
                collection_count: collections.len(),
                total_documents,
                conversion_timestamp: self.clock.now(),
            },
            collections,
        })
    }

    /// Wrap `data` as a document with a fresh identifier and metadata
    pub fn make_document(&self, data: &Value, index: usize) -> Document {
        let now = self.clock.now();
        let random = self.random.borrow_mut().next_segment();

        let fields: Map<String, Value> = process_value(data)
            .into_iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .collect();

        Document {
            id: object_id(now, random, index),
            fields,
            metadata: DocumentMetadata {
                value_type: None,
                created_at: now,
                version: Some(1),
                index: Some(index),
            },
        }
    }

    fn primitive_document(&self, value: &Value) -> Document {
        let now = self.clock.now();
        let random = self.random.borrow_mut().next_segment();

        let mut fields = Map::new();
        fields.insert("value".to_string(), value.clone());

        Document {
            id: object_id(now, random, 0),
            fields,
            metadata: DocumentMetadata {
                value_type: Some(ValueKind::of(value)),
                created_at: now,
                version: None,
                index: None,
            },
        }
    }

    fn collection(&self, name: &str, documents: Vec<Document>, parent: Option<&str>) -> Collection {
        let indexes = suggest_indexes_with_threshold(&documents, self.config.index_coverage_threshold);
        Collection {
            name: name.to_string(),
            documents,
            indexes,
            parent_collection: parent.map(str::to_string),
        }
    }

    /// Lift arrays of objects found on the source objects into their own collections
    ///
    /// Only one level is lifted, and a `<parent>_<field>` collection is built
    /// from the first source object that carries the field.
    fn extract_embedded_collections(&self, data: &Value, parent: &str, collections: &mut Vec<Collection>) {
        let mut names: HashSet<String> = collections.iter().map(|c| c.name.clone()).collect();

        let sources: Vec<&Map<String, Value>> = match data {
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            Value::Object(obj) => vec![obj],
            _ => Vec::new(),
        };

        for obj in sources {
            for (key, value) in obj.iter() {
                let Value::Array(elements) = value else {
                    continue;
                };
                if !elements.iter().any(Value::is_object) {
                    continue;
                }

                let name = self.config.child_name(parent, key);
                if names.contains(&name) {
                    continue;
                }

                let documents: Vec<Document> = elements
                    .iter()
                    .filter(|e| e.is_object())
                    .enumerate()
                    .map(|(index, e)| self.make_document(e, index))
                    .collect();

                debug!(collection = %name, parent, documents = documents.len(), "extracted embedded collection");
                collections.push(self.collection(&name, documents, Some(parent)));
                names.insert(name);
            }
        }
    }
}

/// Recursively process a value into document fields
///
/// Objects keep their keys; arrays and primitives are wrapped as `{"value": ..}`.
fn process_value(value: &Value) -> Map<String, Value> {
    match value {
        Value::Array(items) => {
            let processed = items.iter().map(|item| Value::Object(process_value(item))).collect();
            single_value(Value::Array(processed))
        }
        Value::Object(obj) => obj
            .iter()
            .map(|(key, field)| (key.clone(), process_field(field)))
            .collect(),
        primitive => single_value(primitive.clone()),
    }
}

/// Process a field of an object; primitives pass through unchanged
fn process_field(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| match item {
                    Value::Array(_) | Value::Object(_) => Value::Object(process_value(item)),
                    primitive => primitive.clone(),
                })
                .collect(),
        ),
        Value::Object(_) => Value::Object(process_value(value)),
        primitive => primitive.clone(),
    }
}

fn single_value(value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("value".to_string(), value);
    map
}
