//! Index suggestions for document collections

use crate::types::{Document, IndexSuggestion};
use std::collections::HashMap;

/// Default coverage above which a field gets a single-field index
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.8;

/// Suggest indexes using the default coverage threshold
pub fn suggest_indexes(documents: &[Document]) -> Vec<IndexSuggestion> {
    suggest_indexes_with_threshold(documents, DEFAULT_COVERAGE_THRESHOLD)
}

/// Suggest a single-field index for every field present in more than
/// `threshold` of the documents, plus the `[userId, createdAt]` composite
/// when both fields occur anywhere.
pub fn suggest_indexes_with_threshold(documents: &[Document], threshold: f64) -> Vec<IndexSuggestion> {
    if documents.is_empty() {
        return Vec::new();
    }

    // Field counts in first-seen order
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for doc in documents {
        for key in doc.fields.keys() {
            let count = counts.entry(key.as_str()).or_insert(0);
            if *count == 0 {
                order.push(key.as_str());
            }
            *count += 1;
        }
    }

    let total = documents.len() as f64;
    let mut indexes: Vec<IndexSuggestion> = order
        .iter()
        .filter(|field| counts[**field] as f64 / total > threshold)
        .map(|field| IndexSuggestion::Single {
            field: field.to_string(),
            unique: false,
        })
        .collect();

    if counts.contains_key("userId") && counts.contains_key("createdAt") {
        indexes.push(IndexSuggestion::Composite {
            fields: vec!["userId".to_string(), "createdAt".to_string()],
        });
    }

    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentMetadata;
    use chrono::DateTime;
    use serde_json::{json, Value};

    fn doc(fields: Value) -> Document {
        Document {
            id: "id".to_string(),
            fields: fields.as_object().cloned().unwrap_or_default(),
            metadata: DocumentMetadata {
                value_type: None,
                created_at: DateTime::from_timestamp(0, 0).unwrap(),
                version: Some(1),
                index: Some(0),
            },
        }
    }

    fn docs_with_field_in(present: usize, total: usize) -> Vec<Document> {
        (0..total)
            .map(|i| {
                if i < present {
                    doc(json!({"x": i, "always": true}))
                } else {
                    doc(json!({"always": true}))
                }
            })
            .collect()
    }

    #[test]
    fn test_high_coverage_field_is_indexed() {
        let indexes = suggest_indexes(&docs_with_field_in(9, 10));
        assert!(indexes.contains(&IndexSuggestion::Single {
            field: "x".to_string(),
            unique: false,
        }));
    }

    #[test]
    fn test_low_coverage_field_is_not_indexed() {
        let indexes = suggest_indexes(&docs_with_field_in(5, 10));
        assert_eq!(
            indexes,
            vec![IndexSuggestion::Single {
                field: "always".to_string(),
                unique: false,
            }]
        );
    }

    #[test]
    fn test_exact_threshold_is_not_enough() {
        let indexes = suggest_indexes(&docs_with_field_in(8, 10));
        assert!(!indexes.iter().any(|i| matches!(i, IndexSuggestion::Single { field, .. } if field == "x")));
    }

    #[test]
    fn test_user_created_composite_ignores_coverage() {
        let mut docs = vec![doc(json!({"userId": 1}))];
        docs.extend((0..9).map(|_| doc(json!({"createdAt": "2024-01-01"}))));

        let indexes = suggest_indexes(&docs);
        assert_eq!(
            indexes,
            vec![
                IndexSuggestion::Single {
                    field: "createdAt".to_string(),
                    unique: false,
                },
                IndexSuggestion::Composite {
                    fields: vec!["userId".to_string(), "createdAt".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_no_documents() {
        assert!(suggest_indexes(&[]).is_empty());
    }
}
