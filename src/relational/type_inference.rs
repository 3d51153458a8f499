//! Column type inference for relational tables
//!
//! The first non-null value of a column decides its type. Heterogeneous
//! columns are not reconciled.

use crate::types::{SqlType, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

// Pre-compiled regex patterns
static DATE_FRAGMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap()
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Infer a type for every column of `table`
pub fn infer_column_types(table: &Table) -> BTreeMap<String, SqlType> {
    table
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let sql_type = if *column == table.primary_key {
                SqlType::IntegerPrimaryKey
            } else {
                table
                    .column_values(index)
                    .find(|v| !v.is_null())
                    .map(infer_value_type)
                    .unwrap_or(SqlType::Text)
            };
            (column.clone(), sql_type)
        })
        .collect()
}

/// Infer and store the column types of `table`
pub fn apply_column_types(table: &mut Table) {
    table.column_types = infer_column_types(table);
}

/// SQL type for a single sampled value
pub fn infer_value_type(value: &Value) -> SqlType {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() || n.as_f64().map_or(false, |f| f.fract() == 0.0) {
                SqlType::Integer
            } else {
                SqlType::Real
            }
        }
        Value::Bool(_) => SqlType::Boolean,
        Value::String(s) if is_date(s) => SqlType::Datetime,
        Value::String(s) if is_email(s) => SqlType::Varchar255,
        _ => SqlType::Text,
    }
}

fn is_date(s: &str) -> bool {
    DATE_FRAGMENT_REGEX.is_match(s) && parses_as_date(s.trim())
}

fn parses_as_date(s: &str) -> bool {
    if DateTime::parse_from_rfc3339(s).is_ok() {
        return true;
    }

    if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() {
        return true;
    }

    DATETIME_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
}

fn is_email(s: &str) -> bool {
    EMAIL_REGEX.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_column_table(values: Vec<Value>) -> Table {
        let mut table = Table::new("t", "id");
        table.columns.push("c".to_string());
        table.rows = values
            .into_iter()
            .enumerate()
            .map(|(i, v)| vec![json!(i + 1), v])
            .collect();
        table
    }

    #[test]
    fn test_scalar_types() {
        assert_eq!(infer_value_type(&json!(42)), SqlType::Integer);
        assert_eq!(infer_value_type(&json!(3.14)), SqlType::Real);
        assert_eq!(infer_value_type(&json!(2.0)), SqlType::Integer);
        assert_eq!(infer_value_type(&json!(true)), SqlType::Boolean);
        assert_eq!(infer_value_type(&json!("2024-01-01")), SqlType::Datetime);
        assert_eq!(infer_value_type(&json!("2024-01-01T10:30:00Z")), SqlType::Datetime);
        assert_eq!(infer_value_type(&json!("a@b.com")), SqlType::Varchar255);
        assert_eq!(infer_value_type(&json!("hello")), SqlType::Text);
    }

    #[test]
    fn test_date_fragment_must_parse() {
        assert_eq!(infer_value_type(&json!("2024-13-45")), SqlType::Text);
        assert_eq!(infer_value_type(&json!("order 2024-01-01 shipped")), SqlType::Text);
    }

    #[test]
    fn test_primary_key_column() {
        let types = infer_column_types(&single_column_table(vec![json!(1)]));
        assert_eq!(types["id"], SqlType::IntegerPrimaryKey);
        assert_eq!(types["c"], SqlType::Integer);
    }

    #[test]
    fn test_first_non_null_value_decides() {
        let table = single_column_table(vec![Value::Null, json!("x@y.org"), json!(7)]);
        assert_eq!(infer_column_types(&table)["c"], SqlType::Varchar255);
    }

    #[test]
    fn test_all_null_column_defaults_to_text() {
        let table = single_column_table(vec![Value::Null, Value::Null]);
        assert_eq!(infer_column_types(&table)["c"], SqlType::Text);

        let empty = single_column_table(vec![]);
        assert_eq!(infer_column_types(&empty)["c"], SqlType::Text);
    }

    #[test]
    fn test_apply_column_types_stores_mapping() {
        let mut table = single_column_table(vec![json!(false)]);
        apply_column_types(&mut table);
        assert_eq!(table.column_types.get("c"), Some(&SqlType::Boolean));
    }
}
