//! Relational conversion - JSON into tables, rows and foreign keys
//!
//! Scalar fields become columns of a table; arrays of objects and nested
//! objects are extracted into child tables that point back at their parent
//! row through a `<parent>_id` column.

pub mod converter;
pub mod type_inference;

pub use converter::RelationalConverter;
pub use type_inference::{apply_column_types, infer_column_types, infer_value_type};
