use crate::clock::{Clock, SystemClock};
use crate::error::ConvertResult;
use crate::relational::type_inference::apply_column_types;
use crate::types::{
    check_root_name, is_complex, ConvertConfig, IdCollision, RelationKind, RelationalMetadata,
    RelationalModel, Relationship, Table,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Converts JSON values into tables linked by foreign keys
pub struct RelationalConverter {
    config: ConvertConfig,
    clock: Box<dyn Clock>,
}

impl RelationalConverter {
    pub fn new(config: ConvertConfig) -> Self {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: ConvertConfig, clock: Box<dyn Clock>) -> Self {
        RelationalConverter { config, clock }
    }

    /// Convert a JSON value into a relational model rooted at `root_name`
    pub fn convert(&self, value: &Value, root_name: &str) -> ConvertResult<RelationalModel> {
        check_root_name(root_name)?;

        let mut run = ConversionRun::new(&self.config);
        match value {
            Value::Array(items) => {
                let items: Vec<&Value> = items.iter().collect();
                run.convert_array(&items, root_name);
            }
            Value::Object(_) => {
                // A lone object converts exactly like a one-element array
                run.convert_array(&[value], root_name);
            }
            primitive => run.convert_primitive(primitive, root_name),
        }

        let total_rows: usize = run.tables.iter().map(|t| t.rows.len()).sum();
        debug!(
            root = root_name,
            tables = run.tables.len(),
            relationships = run.relationships.len(),
            total_rows,
            "relational conversion complete"
        );

        Ok(RelationalModel {
            database_name: self.config.database_name(root_name),
            metadata: RelationalMetadata {
                table_count: run.tables.len(),
                total_rows,
                conversion_timestamp: self.clock.now(),
            },
            tables: run.tables,
            relationships: run.relationships,
        })
    }
}

/// State of a single conversion call
struct ConversionRun<'c> {
    config: &'c ConvertConfig,
    tables: Vec<Table>,
    relationships: Vec<Relationship>,
    names: HashSet<String>,
}

impl<'c> ConversionRun<'c> {
    fn new(config: &'c ConvertConfig) -> Self {
        ConversionRun {
            config,
            tables: Vec::new(),
            relationships: Vec::new(),
            names: HashSet::new(),
        }
    }

    fn convert_array(&mut self, items: &[&Value], root_name: &str) {
        let name = self.reserve_name(root_name.to_string());
        let mut table = build_table(items, &name, self.config);
        apply_column_types(&mut table);
        self.tables.push(table);

        self.extract_nested(items, &name, 1);
    }

    fn convert_primitive(&mut self, value: &Value, root_name: &str) {
        let name = self.reserve_name(root_name.to_string());
        let mut table = Table::new(name, "id");
        table.columns.push("value".to_string());
        table.rows.push(vec![Value::from(1u64), sanitize(value)]);
        apply_column_types(&mut table);
        self.tables.push(table);
    }

    /// Claim a table name, adding a numeric suffix if it is already taken
    fn reserve_name(&mut self, wanted: String) -> String {
        if self.names.insert(wanted.clone()) {
            return wanted;
        }

        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", wanted, n);
            if self.names.insert(candidate.clone()) {
                warn!(table = %wanted, renamed = %candidate, "table name already used in this conversion");
                return candidate;
            }
            n += 1;
        }
    }

    /// Extract child tables for the complex-valued fields of `items`
    ///
    /// Fields are taken from the first item; row `i` of the parent table
    /// was built from `items[i]`, so its ordinal is `i + 1`.
    fn extract_nested<'v>(&mut self, items: &[&'v Value], parent: &str, depth: usize) {
        let Some(Value::Object(first)) = items.first().copied() else {
            return;
        };

        if depth > self.config.max_depth {
            warn!(table = parent, max_depth = self.config.max_depth, "nesting too deep, skipping child tables");
            return;
        }

        for key in first.keys() {
            let present: Vec<(usize, &'v Value)> = items
                .iter()
                .enumerate()
                .filter_map(|(i, &item)| item.as_object()?.get(key).map(|v| (i + 1, v)))
                .collect();

            match present.first().map(|(_, v)| *v) {
                Some(Value::Array(_)) => self.extract_array_field(&present, parent, key, depth),
                Some(Value::Object(_)) => self.extract_object_field(&present, parent, key, depth),
                _ => {}
            }
        }
    }

    fn extract_array_field<'v>(
        &mut self,
        present: &[(usize, &'v Value)],
        parent: &str,
        field: &str,
        depth: usize,
    ) {
        // Flatten while remembering which parent row each element came from
        let mut flat: Vec<&'v Value> = Vec::new();
        let mut owners: Vec<usize> = Vec::new();
        for &(ordinal, value) in present {
            match value {
                Value::Array(elements) => {
                    flat.extend(elements.iter());
                    owners.extend(std::iter::repeat(ordinal).take(elements.len()));
                }
                other => {
                    flat.push(other);
                    owners.push(ordinal);
                }
            }
        }

        if !matches!(flat.first(), Some(Value::Object(_))) {
            return;
        }

        let name = self.push_child(&flat, &owners, parent, field, RelationKind::ManyToOne);
        self.extract_nested(&flat, &name, depth + 1);
    }

    fn extract_object_field<'v>(
        &mut self,
        present: &[(usize, &'v Value)],
        parent: &str,
        field: &str,
        depth: usize,
    ) {
        let (objects, owners): (Vec<&'v Value>, Vec<usize>) = present
            .iter()
            .filter(|(_, v)| v.is_object())
            .map(|&(ordinal, v)| (v, ordinal))
            .unzip();

        let name = self.push_child(&objects, &owners, parent, field, RelationKind::OneToOne);
        self.extract_nested(&objects, &name, depth + 1);
    }

    /// Build a child table from `items`, link it to `parent` and return its name
    fn push_child(
        &mut self,
        items: &[&Value],
        owners: &[usize],
        parent: &str,
        field: &str,
        kind: RelationKind,
    ) -> String {
        let name = self.reserve_name(self.config.child_name(parent, field));
        let mut table = build_table(items, &name, self.config);

        let foreign_key = unique_column(&table, self.config.foreign_key(parent));
        table.columns.push(foreign_key.clone());
        for (row, owner) in table.rows.iter_mut().zip(owners) {
            row.push(Value::from(*owner as u64));
        }
        apply_column_types(&mut table);

        debug!(table = %name, parent, rows = table.rows.len(), %kind, "extracted child table");

        self.tables.push(table);
        self.relationships.push(Relationship {
            from: name.clone(),
            to: parent.to_string(),
            kind,
            foreign_key,
        });

        name
    }
}

/// Build a table from the scalar fields of `items`
///
/// The first column is a synthetic row ordinal. Array and object values are
/// left out here and picked up by nested extraction.
fn build_table(items: &[&Value], name: &str, config: &ConvertConfig) -> Table {
    let mut seen = HashSet::new();
    let mut scalar_keys: Vec<&str> = Vec::new();
    for item in items {
        if let Value::Object(obj) = item {
            for (key, value) in obj.iter() {
                if !is_complex(value) && seen.insert(key.as_str()) {
                    scalar_keys.push(key.as_str());
                }
            }
        }
    }

    let primary_key = match config.id_collision {
        IdCollision::Rename if seen.contains("id") => config.row_id_column.as_str(),
        _ => "id",
    };
    scalar_keys.retain(|k| *k != primary_key);

    let mut table = Table::new(name, primary_key);
    table.columns.extend(scalar_keys.iter().map(|k| k.to_string()));
    table.rows = items
        .iter()
        .enumerate()
        .map(|(index, item)| build_row(index, item.as_object(), &scalar_keys))
        .collect();

    table
}

fn build_row(index: usize, obj: Option<&Map<String, Value>>, keys: &[&str]) -> Vec<Value> {
    let mut row = Vec::with_capacity(keys.len() + 1);
    row.push(Value::from(index as u64 + 1));

    for key in keys {
        let cell = obj
            .and_then(|o| o.get(*key))
            .filter(|v| !is_complex(v))
            .map(sanitize)
            .unwrap_or(Value::Null);
        row.push(cell);
    }

    row
}

/// Prepare a scalar for embedding in SQL text: single quotes are doubled
fn sanitize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace('\'', "''")),
        other => other.clone(),
    }
}

fn unique_column(table: &Table, wanted: String) -> String {
    if !table.has_column(&wanted) {
        return wanted;
    }

    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", wanted, n);
        if !table.has_column(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::types::SqlType;
    use serde_json::json;

    fn converter() -> RelationalConverter {
        RelationalConverter::with_clock(
            ConvertConfig::default(),
            Box::new(FixedClock::at_epoch_secs(1_700_000_000)),
        )
    }

    fn assert_well_formed(model: &RelationalModel) {
        for table in &model.tables {
            for row in &table.rows {
                assert_eq!(row.len(), table.columns.len(), "ragged row in {}", table.name);
            }
        }
        for rel in &model.relationships {
            let from = model.table(&rel.from).expect("from table exists");
            assert!(model.table(&rel.to).is_some());
            assert!(from.has_column(&rel.foreign_key));
        }
    }

    #[test]
    fn test_flat_array() {
        let input = json!([
            {"name": "Alice", "age": 30},
            {"name": "Bob", "email": "bob@example.com"}
        ]);

        let model = converter().convert(&input, "people").unwrap();

        assert_eq!(model.database_name, "people_db");
        assert_eq!(model.tables.len(), 1);
        let table = &model.tables[0];
        assert_eq!(table.columns, vec!["id", "name", "age", "email"]);
        assert_eq!(table.rows[0], vec![json!(1), json!("Alice"), json!(30), Value::Null]);
        assert_eq!(table.rows[1], vec![json!(2), json!("Bob"), Value::Null, json!("bob@example.com")]);
        assert_eq!(table.column_types["age"], SqlType::Integer);
        assert_eq!(table.column_types["email"], SqlType::Varchar255);
        assert_eq!(model.metadata.table_count, 1);
        assert_eq!(model.metadata.total_rows, 2);
    }

    #[test]
    fn test_row_ids_are_ordinals() {
        let items: Vec<Value> = (0..25).map(|i| json!({"n": i})).collect();
        let model = converter().convert(&Value::Array(items), "t").unwrap();

        let ids: Vec<Value> = model.tables[0].rows.iter().map(|r| r[0].clone()).collect();
        let expected: Vec<Value> = (1..=25).map(|i| json!(i)).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_empty_array() {
        let model = converter().convert(&json!([]), "empty").unwrap();
        assert_eq!(model.tables.len(), 1);
        assert_eq!(model.tables[0].columns, vec!["id"]);
        assert!(model.tables[0].rows.is_empty());
        assert!(model.relationships.is_empty());
    }

    #[test]
    fn test_primitive_input() {
        let model = converter().convert(&json!("it's"), "scalar").unwrap();
        let table = &model.tables[0];
        assert_eq!(table.columns, vec!["id", "value"]);
        assert_eq!(table.rows, vec![vec![json!(1), json!("it''s")]]);
    }

    #[test]
    fn test_strings_escaped_and_booleans_kept() {
        let model = converter().convert(&json!({"name": "O'Brien", "active": true}), "t").unwrap();
        let table = &model.tables[0];
        assert_eq!(table.rows[0], vec![json!(1), json!("O''Brien"), json!(true)]);
        assert_eq!(table.column_types["active"], SqlType::Boolean);
    }

    #[test]
    fn test_source_id_renames_synthetic_key() {
        let input = json!([
            {"id": "x", "tags": ["a", "b"]},
            {"id": "y", "tags": ["c"]}
        ]);

        let model = converter().convert(&input, "items").unwrap();
        let root = &model.tables[0];

        assert_eq!(root.columns, vec!["_row_id", "id"]);
        assert_eq!(root.primary_key, "_row_id");
        assert_eq!(root.rows, vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);
        assert_eq!(root.column_types["_row_id"], SqlType::IntegerPrimaryKey);
        assert_eq!(root.column_types["id"], SqlType::Text);
        // Scalar arrays stay in the document model only
        assert_eq!(model.tables.len(), 1);
    }

    #[test]
    fn test_drop_source_policy_keeps_legacy_behavior() {
        let config = ConvertConfig {
            id_collision: IdCollision::DropSource,
            ..ConvertConfig::default()
        };
        let model = RelationalConverter::new(config)
            .convert(&json!([{"id": "x", "n": 1}]), "items")
            .unwrap();
        assert_eq!(model.tables[0].columns, vec!["id", "n"]);
        assert_eq!(model.tables[0].rows[0], vec![json!(1), json!(1)]);
    }

    #[test]
    fn test_nested_array_tracks_parent_rows() {
        let input = json!([
            {"name": "a", "tags": [{"label": "t1"}, {"label": "t2"}]},
            {"name": "b", "tags": [{"label": "t3"}]}
        ]);

        let model = converter().convert(&input, "items").unwrap();
        assert_well_formed(&model);

        let tags = model.table("items_tags").unwrap();
        assert_eq!(tags.columns, vec!["id", "label", "items_id"]);
        let fks: Vec<Value> = tags.rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(fks, vec![json!(1), json!(1), json!(2)]);
        assert_eq!(tags.column_types["items_id"], SqlType::Integer);

        assert_eq!(
            model.relationships,
            vec![Relationship {
                from: "items_tags".to_string(),
                to: "items".to_string(),
                kind: RelationKind::ManyToOne,
                foreign_key: "items_id".to_string(),
            }]
        );
    }

    #[test]
    fn test_uneven_arrays_are_not_apportioned() {
        let input = json!([
            {"posts": [{"t": 1}, {"t": 2}, {"t": 3}]},
            {"posts": []},
            {"posts": [{"t": 4}]}
        ]);

        let model = converter().convert(&input, "users").unwrap();
        let posts = model.table("users_posts").unwrap();
        let fks: Vec<Value> = posts.rows.iter().map(|r| r[2].clone()).collect();
        assert_eq!(fks, vec![json!(1), json!(1), json!(1), json!(3)]);
    }

    #[test]
    fn test_nested_object_is_one_to_one() {
        let input = json!({"name": "Alice", "address": {"city": "Paris", "zip": "75001"}});

        let model = converter().convert(&input, "users").unwrap();
        assert_well_formed(&model);

        let address = model.table("users_address").unwrap();
        assert_eq!(address.columns, vec!["id", "city", "zip", "users_id"]);
        assert_eq!(address.rows[0], vec![json!(1), json!("Paris"), json!("75001"), json!(1)]);
        assert_eq!(model.relationships[0].kind, RelationKind::OneToOne);
        assert_eq!(model.relationships[0].from, "users_address");
        assert_eq!(model.relationships[0].to, "users");
        assert!(address.has_column(&model.relationships[0].foreign_key));
        assert!(!model.table("users").unwrap().has_column(&model.relationships[0].foreign_key));
    }

    #[test]
    fn test_missing_nested_object_keeps_parent_ordinal() {
        let input = json!([
            {"profile": {"bio": "first"}},
            {"other": 1},
            {"profile": {"bio": "third"}}
        ]);

        let model = converter().convert(&input, "users").unwrap();
        let profile = model.table("users_profile").unwrap();
        assert_eq!(profile.rows.len(), 2);
        assert_eq!(profile.rows[1], vec![json!(2), json!("third"), json!(3)]);
    }

    #[test]
    fn test_depth_first_creation_order() {
        let input = json!({
            "orders": [
                {"total": 10, "items": [{"sku": "a"}], "shipping": {"city": "Oslo"}}
            ],
            "profile": {"bio": "hi"}
        });

        let model = converter().convert(&input, "user").unwrap();
        assert_well_formed(&model);

        let names: Vec<&str> = model.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["user", "user_orders", "user_orders_items", "user_orders_shipping", "user_profile"]
        );
        assert_eq!(model.relationships.len(), 4);
        assert_eq!(model.relationships[1].foreign_key, "user_orders_id");
    }

    #[test]
    fn test_colliding_child_names_are_disambiguated() {
        let input = json!({
            "a": {"b_c": {"x": 1}},
            "a_b": {"c": {"y": 2}}
        });

        let model = converter().convert(&input, "t").unwrap();
        assert_well_formed(&model);

        let names: HashSet<&str> = model.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), model.tables.len());
        assert!(names.contains("t_a_b_c"));
        assert!(names.contains("t_a_b_c_2"));
    }

    #[test]
    fn test_max_depth_stops_extraction() {
        let config = ConvertConfig {
            max_depth: 1,
            ..ConvertConfig::default()
        };
        let input = json!({"a": {"b": {"c": 1}}});
        let model = RelationalConverter::new(config).convert(&input, "t").unwrap();

        let names: Vec<&str> = model.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["t", "t_a"]);
    }

    #[test]
    fn test_blank_root_name_is_invalid() {
        assert!(converter().convert(&json!([]), "  ").is_err());
    }

    #[test]
    fn test_same_clock_is_idempotent() {
        let input = json!([{"a": 1, "b": [{"c": "x"}]}]);
        let first = serde_json::to_string(&converter().convert(&input, "t").unwrap()).unwrap();
        let second = serde_json::to_string(&converter().convert(&input, "t").unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
