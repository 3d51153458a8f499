//! SQL text rendering
//!
//! Output is for display and snapshots. Values are embedded as literals, so
//! anything executing these statements must switch to bound parameters.

use crate::types::{RelationalModel, SqlType, Table};
use serde_json::Value;

/// Render one `CREATE TABLE` per table followed by a relationship comment block
pub fn render_schema(model: &RelationalModel) -> String {
    let mut statements: Vec<String> = model.tables.iter().map(create_table).collect();

    if !model.relationships.is_empty() {
        statements.push("\n-- Relationships:".to_string());
        for rel in &model.relationships {
            let target_key = model
                .table(&rel.to)
                .map(|t| t.primary_key.as_str())
                .unwrap_or("id");
            statements.push(format!(
                "-- {}.{} -> {}.{} ({})",
                rel.from, rel.foreign_key, rel.to, target_key, rel.kind
            ));
        }
    }

    statements.join("\n\n")
}

fn create_table(table: &Table) -> String {
    let column_defs: Vec<String> = table
        .columns
        .iter()
        .map(|col| {
            let sql_type = table.column_types.get(col).copied().unwrap_or(SqlType::Text);
            format!("  {} {}", col, sql_type)
        })
        .collect();

    format!("CREATE TABLE {} (\n{}\n);", table.name, column_defs.join(",\n"))
}

/// Render one `INSERT` per row, tables in model order
pub fn render_inserts(model: &RelationalModel) -> String {
    let mut statements = Vec::new();

    for table in model.tables.iter().filter(|t| !t.rows.is_empty()) {
        let columns = table.columns.join(", ");
        for row in &table.rows {
            let values: Vec<String> = row.iter().map(sql_literal).collect();
            statements.push(format!(
                "INSERT INTO {} ({}) VALUES ({});",
                table.name,
                columns,
                values.join(", ")
            ));
        }
    }

    statements.join("\n")
}

/// Literal for a table cell; strings were already escaped during conversion
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => (if *b { "1" } else { "0" }).to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s),
        // Tables never hold containers; fall back to their JSON text
        other => format!("'{}'", other.to_string().replace('\'', "''")),
    }
}
