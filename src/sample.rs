//! Sample index builder
//!
//! Turns a JSON-lines file of car listings into an index that exercises
//! every field flavour the shell can inspect:
//!
//! | JSON key                                | Indexed as                                        |
//! |-----------------------------------------|---------------------------------------------------|
//! | `id`, `year`, `mileage`                 | numeric doc values                                |
//! | `price`                                 | double doc values                                 |
//! | `contents`                              | tokenized text, not stored                        |
//! | `color`, `category`, `makemodel`, `city`| sorted doc values + stored `<key>_indexed` string |
//! | `tags` (comma separated)                | sorted-set doc values + `tags_indexed` strings    |
//! |                                         | + `tags_payload` text with term vectors           |
//! | whole line                              | `json` binary doc values                          |

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::handle::IndexWriter;
use crate::store::types::{Codec, Document, Field};
use crate::store::FsDirectory;

const META_FIELDS: [&str; 4] = ["color", "category", "makemodel", "city"];

/// Builds sample indexes from JSON lines
#[derive(Debug, Clone)]
pub struct SampleIndexBuilder {
    codec: Codec,
    max_buffered_docs: usize,
}

impl Default for SampleIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleIndexBuilder {
    pub fn new() -> Self {
        Self {
            codec: Codec::Binary,
            max_buffered_docs: 10_000,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Documents per flushed segment
    pub fn with_max_buffered_docs(mut self, max_buffered_docs: usize) -> Self {
        self.max_buffered_docs = max_buffered_docs;
        self
    }

    /// Index every line of `source` into a new index at `index`
    ///
    /// Any existing index at `index` is replaced. Blank lines are skipped;
    /// a malformed line aborts the build.
    pub fn build(&self, source: &Path, index: &Path) -> Result<usize> {
        let file = File::open(source)
            .with_context(|| format!("Failed to open {}", source.display()))?;
        let mut writer = FsDirectory::create(index, self.codec, self.max_buffered_docs)
            .with_context(|| format!("Failed to create index at {}", index.display()))?;

        let mut count = 0;
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {}", source.display()))?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let json: Value = serde_json::from_str(line)
                .with_context(|| format!("Invalid JSON on line {}", line_no + 1))?;
            let doc = sample_document(&json, line)
                .with_context(|| format!("Invalid document on line {}", line_no + 1))?;
            writer.add_document(doc)?;
            count += 1;
        }

        Box::new(writer).close()?;
        tracing::info!(
            source = %source.display(),
            index = %index.display(),
            docs = count,
            codec = %self.codec,
            "Built sample index"
        );
        Ok(count)
    }
}

/// Map one JSON listing to a document; `raw` is kept as the `json` doc value
pub fn sample_document(json: &Value, raw: &str) -> Result<Document> {
    let id = json
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("missing numeric id"))?;

    let mut doc = Document::new()
        .with(Field::numeric_doc_value("id", id))
        .with(Field::double_doc_value("price", number(json, "price").unwrap_or(f64::NAN)))
        .with(Field::text("contents", string(json, "contents").unwrap_or_default()))
        .with(Field::numeric_doc_value("year", number(json, "year").unwrap_or(0.0) as i64))
        .with(Field::numeric_doc_value("mileage", number(json, "mileage").unwrap_or(0.0) as i64));

    for name in META_FIELDS {
        let value = string(json, name).unwrap_or_default();
        doc.add(Field::sorted_doc_value(name, value.as_bytes()));
        doc.add(Field::string(format!("{}_indexed", name), value));
    }

    let tags = string(json, "tags").unwrap_or_default();
    for tag in tags.split(',') {
        doc.add(Field::sorted_set_doc_value("tags", tag.as_bytes()));
        doc.add(Field::string("tags_indexed", tag));
    }
    doc.add(Field::text_with_vectors("tags_payload", tags.as_str()));

    doc.add(Field::binary_doc_value("json", raw.as_bytes()));
    Ok(doc)
}

fn number(json: &Value, key: &str) -> Option<f64> {
    match json.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Missing keys read as empty strings, other scalars in their JSON form
fn string(json: &Value, key: &str) -> Option<String> {
    match json.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::{IndexHandleFactory, IndexReader};
    use crate::store::types::{DocValue, DocValuesType, IndexOptions};
    use serde_json::json;
    use std::io::Write;
    use tempfile::tempdir;

    fn sample_lines() -> String {
        [
            r#"{"id":0,"color":"red","category":"compact","makemodel":"honda/civic","city":"San Jose","price":9500.0,"year":2008,"mileage":90000,"tags":"cool,reliable","contents":"Red Honda Civic, runs great"}"#,
            "",
            r#"{"id":1,"color":"blue","category":"sports car","makemodel":"bmw/m3","city":"Palo Alto","price":32000,"year":2012,"mileage":15000,"tags":"fast","contents":"Blue BMW M3"}"#,
            r#"{"id":2,"color":"white","price":"4100.5","tags":"cheap,reliable,old","contents":"white van"}"#,
        ]
        .join("\n")
    }

    fn write_source(dir: &Path, content: &str) -> std::path::PathBuf {
        let path = dir.join("cars.json");
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_document_layout() {
        let value = json!({"id": 7, "color": "red", "tags": "a,b", "price": 1.5});
        let doc = sample_document(&value, "{}").unwrap();

        let names: Vec<&str> = doc.fields.iter().map(|f| f.name.as_str()).collect();
        for expected in [
            "id", "price", "contents", "year", "mileage", "color", "color_indexed", "tags",
            "tags_indexed", "tags_payload", "json",
        ] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert_eq!(names.iter().filter(|n| **n == "tags").count(), 2);
    }

    #[test]
    fn test_missing_id_rejected() {
        assert!(sample_document(&json!({"color": "red"}), "{}").is_err());
    }

    #[test]
    fn test_build_index() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), &sample_lines());
        let index = dir.path().join("index");

        let count = SampleIndexBuilder::new()
            .with_max_buffered_docs(2)
            .build(&source, &index)
            .unwrap();
        assert_eq!(count, 3);

        let directory = FsDirectory::open(&index).unwrap();
        let reader = directory.open_reader().unwrap();
        assert_eq!(reader.num_docs(), 3);
        assert_eq!(reader.leaves().len(), 2);

        let leaf = reader.leaves()[0];
        let tags = leaf.field_infos().iter().find(|f| f.name == "tags").unwrap();
        assert_eq!(tags.doc_values, DocValuesType::SortedSet);
        let payload = leaf
            .field_infos()
            .iter()
            .find(|f| f.name == "tags_payload")
            .unwrap();
        assert_eq!(
            payload.index_options,
            IndexOptions::DocsAndFreqsAndPositionsAndOffsets
        );
        assert!(payload.has_vectors);

        assert_eq!(
            leaf.doc_value("tags", 0),
            Some(DocValue::SortedSet(vec![b"cool".to_vec(), b"reliable".to_vec()]))
        );
        assert_eq!(leaf.doc_value("year", 1), Some(DocValue::Numeric(2012)));

        let (last, local) = reader.leaf_for_doc(2).unwrap();
        assert_eq!(
            last.doc_value("price", local),
            Some(DocValue::Numeric(4100.5f64.to_bits() as i64))
        );
        assert_eq!(last.doc_value("mileage", local), Some(DocValue::Numeric(0)));
    }

    #[test]
    fn test_text_codec_build() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), &sample_lines());
        let index = dir.path().join("index");

        SampleIndexBuilder::new()
            .with_codec(Codec::Text)
            .build(&source, &index)
            .unwrap();
        let commit = FsDirectory::open(&index).unwrap().latest_commit().unwrap();
        assert_eq!(commit.codec.as_deref(), Some("SimpleText"));
    }

    #[test]
    fn test_bad_line_reports_line_number() {
        let dir = tempdir().unwrap();
        let source = write_source(dir.path(), "{\"id\":1}\nnot json\n");
        let err = SampleIndexBuilder::new()
            .build(&source, &dir.path().join("index"))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"));
    }
}
