//! Document conversion - JSON into collections of documents
//!
//! Every array element (or the lone object) becomes a document with a
//! generated `_id` and a `_metadata` block. Arrays of objects found on the
//! source objects are additionally lifted into child collections.

pub mod converter;
pub mod indexes;

pub use converter::DocumentConverter;
pub use indexes::{suggest_indexes, suggest_indexes_with_threshold};
