use crate::error::ConvertResult;
use crate::types::{Document, DocumentModel, RelationalModel, Table};
use serde_json::{Map, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writes tables and collections to JSON Lines files, one file per name
///
/// Names are mapped through [`file_stem`] before they touch the filesystem.
pub struct ModelWriter {
    output_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl ModelWriter {
    /// Create a writer that places `<name>.jsonl` files in `output_dir`
    pub fn new<P: AsRef<Path>>(output_dir: P) -> ConvertResult<Self> {
        std::fs::create_dir_all(&output_dir)?;

        Ok(ModelWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
            writers: HashMap::new(),
        })
    }

    /// Write every table row as a column-keyed object to `<table>.jsonl`
    pub fn write_relational(&mut self, model: &RelationalModel) -> ConvertResult<()> {
        for table in &model.tables {
            let writer = self.writer_for(&table.name)?;
            for index in 0..table.rows.len() {
                let json = serde_json::to_string(&row_object(table, index))?;
                writeln!(writer, "{}", json)?;
            }
        }
        Ok(())
    }

    /// Write every document to `<collection>.jsonl`
    pub fn write_documents(&mut self, model: &DocumentModel) -> ConvertResult<()> {
        for collection in &model.collections {
            let writer = self.writer_for(&collection.name)?;
            for doc in &collection.documents {
                let json = serde_json::to_string(doc)?;
                writeln!(writer, "{}", json)?;
            }
        }
        Ok(())
    }

    /// Flush all writers
    pub fn flush(&mut self) -> ConvertResult<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn writer_for(&mut self, name: &str) -> ConvertResult<&mut BufWriter<File>> {
        // Keyed by stem so names that map to the same file share one writer
        let writer = match self.writers.entry(file_stem(name)) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.output_dir.join(format!("{}.jsonl", entry.key()));
                entry.insert(BufWriter::new(File::create(path)?))
            }
        };
        Ok(writer)
    }
}

/// File stem for a table or collection name
///
/// Names come from JSON keys, so anything outside `[A-Za-z0-9_.-]` (path
/// separators included) becomes `_` and the file stays inside the output
/// directory.
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// A simpler writer that writes all rows and documents to a single output
pub struct SingleWriter<W: Write> {
    writer: W,
}

impl<W: Write> SingleWriter<W> {
    pub fn new(writer: W) -> Self {
        SingleWriter { writer }
    }

    pub fn write_relational(&mut self, model: &RelationalModel) -> ConvertResult<()> {
        for table in &model.tables {
            for index in 0..table.rows.len() {
                let mut data = row_object(table, index);
                data.insert("_table".to_string(), Value::String(table.name.clone()));
                writeln!(self.writer, "{}", serde_json::to_string(&data)?)?;
            }
        }
        Ok(())
    }

    pub fn write_documents(&mut self, model: &DocumentModel) -> ConvertResult<()> {
        for collection in &model.collections {
            for doc in &collection.documents {
                let mut data = document_object(doc)?;
                data.insert("_collection".to_string(), Value::String(collection.name.clone()));
                writeln!(self.writer, "{}", serde_json::to_string(&data)?)?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> ConvertResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

fn row_object(table: &Table, index: usize) -> Map<String, Value> {
    table
        .columns
        .iter()
        .cloned()
        .zip(table.rows[index].iter().cloned())
        .collect()
}

fn document_object(doc: &Document) -> ConvertResult<Map<String, Value>> {
    match serde_json::to_value(doc)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{FixedClock, FixedRandom};
    use crate::document::DocumentConverter;
    use crate::relational::RelationalConverter;
    use crate::types::ConvertConfig;
    use serde_json::json;

    fn models(input: &Value) -> (RelationalModel, DocumentModel) {
        let relational = RelationalConverter::with_clock(
            ConvertConfig::default(),
            Box::new(FixedClock::at_epoch_secs(0)),
        )
        .convert(input, "users")
        .unwrap();
        let document = DocumentConverter::with_sources(
            ConvertConfig::default(),
            Box::new(FixedClock::at_epoch_secs(0)),
            Box::new(FixedRandom(1)),
        )
        .convert(input, "users")
        .unwrap();
        (relational, document)
    }

    #[test]
    fn test_single_writer() {
        let input = json!([{"name": "Alice", "posts": [{"title": "Hi"}]}]);
        let (relational, document) = models(&input);

        let mut buffer = Vec::new();
        {
            let mut writer = SingleWriter::new(&mut buffer);
            writer.write_relational(&relational).unwrap();
            writer.write_documents(&document).unwrap();
            writer.flush().unwrap();
        }

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], json!({"id": 1, "name": "Alice", "_table": "users"}));
        assert_eq!(lines[1]["_table"], "users_posts");
        assert_eq!(lines[1]["users_id"], 1);
        assert_eq!(lines[2]["_collection"], "users");
        assert_eq!(lines[3]["_collection"], "users_posts");
    }

    #[test]
    fn test_model_writer_creates_file_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let input = json!([{"name": "Alice", "posts": [{"title": "Hi"}, {"title": "Yo"}]}]);
        let (relational, _) = models(&input);

        let mut writer = ModelWriter::new(dir.path()).unwrap();
        writer.write_relational(&relational).unwrap();
        writer.flush().unwrap();

        let posts = std::fs::read_to_string(dir.path().join("users_posts.jsonl")).unwrap();
        assert_eq!(posts.lines().count(), 2);
        assert!(dir.path().join("users.jsonl").exists());
    }

    #[test]
    fn test_file_stem_replaces_path_characters() {
        assert_eq!(file_stem("users_posts"), "users_posts");
        assert_eq!(file_stem("users_a/b"), "users_a_b");
        assert_eq!(file_stem("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(file_stem("t_caf\u{e9} x"), "t_caf__x");
    }

    #[test]
    fn test_model_writer_handles_slash_in_key() {
        let dir = tempfile::tempdir().unwrap();
        let input = json!([{"name": "a", "a/b": [{"x": 1}], "../up": [{"y": 2}]}]);
        let (relational, document) = models(&input);
        assert!(relational.table("users_a/b").is_some());

        let sql_dir = dir.path().join("sql");
        let mut writer = ModelWriter::new(&sql_dir).unwrap();
        writer.write_relational(&relational).unwrap();
        writer.flush().unwrap();

        let nested = std::fs::read_to_string(sql_dir.join("users_a_b.jsonl")).unwrap();
        assert_eq!(nested.lines().count(), 1);
        assert!(sql_dir.join("users_.._up.jsonl").exists());
        assert!(!dir.path().join("up.jsonl").exists());

        let nosql_dir = dir.path().join("nosql");
        let mut writer = ModelWriter::new(&nosql_dir).unwrap();
        writer.write_documents(&document).unwrap();
        writer.flush().unwrap();
        assert!(nosql_dir.join("users_a_b.jsonl").exists());
    }
}
