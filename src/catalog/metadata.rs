//! Metadata catalog
//!
//! Table descriptions (columns, primary key, sequence, foreign keys) read from
//! the metadata file. Every scalar in the file is a quoted string:
//!
//! ```json
//! {
//!   "customer": {
//!     "sequence": "",
//!     "primary_key": "id",
//!     "columns": [
//!       {"name": "id", "type": "integer", "data_type": "4", "type_name": "INTEGER",
//!        "length": "10", "not_null": "true"}
//!     ],
//!     "foreign_key": {}
//!   }
//! }
//! ```
//!
//! Table and column names are canonicalized (trimmed, lower-cased) on load and
//! on every lookup.

use std::path::Path;

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::catalog::labels::LabelCatalog;
use crate::catalog::write_document;
use crate::document::{self, Document, DocumentMap};
use crate::error::{EngineError, Result};
use crate::sql::sanitize::canonical_name;
use crate::types::SqlType;

/// One column of a table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// JDBC type code
    pub data_type: i32,
    /// Vendor type name, e.g. `VARCHAR`
    pub type_name: String,
    pub length: i32,
    pub not_null: bool,
    /// Display label attached from the label catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ColumnMetadata {
    pub fn new(name: impl AsRef<str>, data_type: i32) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            data_type,
            type_name: String::new(),
            length: 0,
            not_null: false,
            label: None,
        }
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    pub fn length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Logical type derived from the JDBC code
    pub fn sql_type(&self) -> SqlType {
        SqlType::from_code(self.data_type)
    }

    fn from_document(table: &str, entry: &Document) -> Result<Self> {
        let map = entry.as_object().ok_or_else(|| {
            EngineError::metadata(format!("Column entry of table '{}' is not an object", table))
        })?;

        let name = text_field(map, "name")
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| {
                EngineError::metadata(format!("Column of table '{}' has no name", table))
            })?;

        let data_type = int_field(table, &name, map, "data_type")?;
        let length = int_field(table, &name, map, "length")?;
        let not_null = text_field(map, "not_null")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            name: canonical_name(&name),
            data_type,
            type_name: text_field(map, "type_name").unwrap_or_default(),
            length,
            not_null,
            label: None,
        })
    }

    fn to_document(&self) -> Document {
        let mut map = DocumentMap::new();
        map.insert("name", Document::from(&self.name));
        map.insert("type", Document::from(self.sql_type().as_str()));
        map.insert("data_type", Document::from(self.data_type.to_string()));
        map.insert("type_name", Document::from(&self.type_name));
        map.insert("length", Document::from(self.length.to_string()));
        map.insert("not_null", Document::from(self.not_null.to_string()));
        Document::Object(map)
    }
}

/// A single-column foreign key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Local column
    pub column: String,
    /// Referenced table; may be empty when the reference could not be resolved
    pub table: String,
}

/// Description of one table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub primary_key: Option<String>,
    pub sequence: Option<String>,
    pub columns: Vec<ColumnMetadata>,
    #[serde(serialize_with = "serialize_foreign_keys")]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableMetadata {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: canonical_name(name.as_ref()),
            primary_key: None,
            sequence: None,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn primary_key(mut self, column: impl AsRef<str>) -> Self {
        self.primary_key = non_empty(column.as_ref());
        self
    }

    pub fn sequence(mut self, sequence: impl AsRef<str>) -> Self {
        self.sequence = non_empty(sequence.as_ref());
        self
    }

    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare `column` as referencing `table`
    pub fn foreign_key(mut self, column: impl AsRef<str>, table: impl AsRef<str>) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: canonical_name(column.as_ref()),
            table: canonical_name(table.as_ref()),
        });
        self
    }

    /// Find a column by name
    pub fn find_column(&self, name: &str) -> Option<&ColumnMetadata> {
        let name = canonical_name(name);
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn from_document(name: &str, entry: &Document) -> Result<Self> {
        let map = entry.as_object().ok_or_else(|| {
            EngineError::metadata(format!("Entry for table '{}' is not an object", name))
        })?;

        let mut table = TableMetadata::new(name)
            .primary_key(text_field(map, "primary_key").unwrap_or_default())
            .sequence(text_field(map, "sequence").unwrap_or_default());

        if let Some(columns) = map.get("columns") {
            let columns = columns.as_array().ok_or_else(|| {
                EngineError::metadata(format!("'columns' of table '{}' is not an array", name))
            })?;
            for column in columns {
                table.columns.push(ColumnMetadata::from_document(&table.name, column)?);
            }
        }

        if let Some(keys) = map.get("foreign_key") {
            let keys = keys.as_object().ok_or_else(|| {
                EngineError::metadata(format!("'foreign_key' of table '{}' is not an object", name))
            })?;
            for (column, referenced) in keys.iter() {
                let referenced = referenced.to_text().unwrap_or_default();
                table = table.foreign_key(column, referenced);
            }
        }

        Ok(table)
    }

    fn to_document(&self) -> Document {
        let mut map = DocumentMap::new();
        map.insert("sequence", Document::from(self.sequence.clone().unwrap_or_default()));
        map.insert(
            "primary_key",
            Document::from(self.primary_key.clone().unwrap_or_default()),
        );
        map.insert(
            "columns",
            Document::Array(self.columns.iter().map(ColumnMetadata::to_document).collect()),
        );
        let keys: DocumentMap = self
            .foreign_keys
            .iter()
            .map(|fk| (fk.column.clone(), Document::from(&fk.table)))
            .collect();
        map.insert("foreign_key", Document::Object(keys));
        Document::Object(map)
    }
}

fn serialize_foreign_keys<S: Serializer>(
    keys: &[ForeignKey],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(keys.len()))?;
    for fk in keys {
        map.serialize_entry(&fk.column, &fk.table)?;
    }
    map.end()
}

/// All table descriptions, in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataCatalog {
    tables: Vec<TableMetadata>,
}

impl MetadataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any previous description with the same name
    pub fn with_table(mut self, table: TableMetadata) -> Self {
        self.insert(table);
        self
    }

    pub fn insert(&mut self, table: TableMetadata) {
        match self.tables.iter_mut().find(|t| t.name == table.name) {
            Some(existing) => *existing = table,
            None => self.tables.push(table),
        }
    }

    /// Read and parse a metadata file
    pub fn load(path: impl AsRef<Path>, case_sensitive: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::metadata(format!(
                "Metadata file '{}' not found",
                path.display()
            )));
        }

        let doc = document::parse_file(path, case_sensitive).map_err(|e| {
            EngineError::metadata(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_document(&doc)
    }

    /// Build from an already parsed metadata document
    pub fn from_document(doc: &Document) -> Result<Self> {
        let root = match doc {
            Document::Object(map) => map,
            Document::Null => return Ok(Self::new()),
            _ => return Err(EngineError::metadata("Metadata root must be an object")),
        };

        let mut catalog = Self::new();
        for (name, entry) in root.iter() {
            catalog.insert(TableMetadata::from_document(name, entry)?);
        }
        Ok(catalog)
    }

    /// Serialize in the metadata file format
    pub fn to_document(&self) -> Document {
        let map: DocumentMap = self
            .tables
            .iter()
            .map(|t| (t.name.clone(), t.to_document()))
            .collect();
        Document::Object(map)
    }

    /// Write the metadata file, creating parent directories as needed
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        write_document(path.as_ref(), &self.to_document())
    }

    /// Copy display labels onto the matching columns
    pub fn attach_labels(&mut self, labels: &LabelCatalog) {
        for table in &mut self.tables {
            for column in &mut table.columns {
                column.label = labels.label(&table.name, &column.name).map(str::to_string);
            }
        }
    }

    pub fn tables(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn contains(&self, table: &str) -> bool {
        let name = canonical_name(table);
        self.tables.iter().any(|t| t.name == name)
    }

    pub fn table(&self, table: &str) -> Result<&TableMetadata> {
        let name = canonical_name(table);
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| EngineError::unknown_table(&name))
    }

    pub fn primary_key(&self, table: &str) -> Result<Option<&str>> {
        Ok(self.table(table)?.primary_key.as_deref())
    }

    pub fn sequence_name(&self, table: &str) -> Result<Option<&str>> {
        Ok(self.table(table)?.sequence.as_deref())
    }

    /// Columns in source order, with labels when a label catalog was attached
    pub fn columns(&self, table: &str) -> Result<&[ColumnMetadata]> {
        Ok(&self.table(table)?.columns)
    }

    pub fn column_names(&self, table: &str) -> Result<Vec<&str>> {
        Ok(self.table(table)?.column_names())
    }

    /// Foreign-key column to referenced table, in declaration order
    pub fn referenced_tables(&self, table: &str) -> Result<&[ForeignKey]> {
        Ok(&self.table(table)?.foreign_keys)
    }

    pub fn column_types(&self, table: &str) -> Result<Vec<(&str, SqlType)>> {
        Ok(self
            .columns(table)?
            .iter()
            .map(|c| (c.name.as_str(), c.sql_type()))
            .collect())
    }

    pub fn column_lengths(&self, table: &str) -> Result<Vec<(&str, i32)>> {
        Ok(self
            .columns(table)?
            .iter()
            .map(|c| (c.name.as_str(), c.length))
            .collect())
    }

    pub fn column_not_null(&self, table: &str) -> Result<Vec<(&str, bool)>> {
        Ok(self
            .columns(table)?
            .iter()
            .map(|c| (c.name.as_str(), c.not_null))
            .collect())
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = canonical_name(value);
    if value.is_empty() { None } else { Some(value) }
}

fn text_field(map: &DocumentMap, key: &str) -> Option<String> {
    map.get(key).and_then(Document::to_text)
}

fn int_field(table: &str, column: &str, map: &DocumentMap, key: &str) -> Result<i32> {
    match text_field(map, key) {
        None => Ok(0),
        Some(text) if text.trim().is_empty() => Ok(0),
        Some(text) => text.trim().parse::<i32>().map_err(|_| {
            EngineError::metadata(format!(
                "Invalid '{}' value '{}' for column '{}.{}'",
                key, text, table, column
            ))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::codes;

    const METADATA: &str = r#"{
        "Customer": {
            "sequence": "",
            "primary_key": "ID",
            "columns": [
                {"name": "id", "type": "integer", "data_type": "4", "type_name": "INTEGER", "length": "10", "not_null": "true"},
                {"name": "Name", "type": "string", "data_type": "12", "type_name": "VARCHAR", "length": "60", "not_null": "false"}
            ],
            "foreign_key": {}
        },
        "order": {
            "sequence": "gen_order_id",
            "primary_key": "id",
            "columns": [
                {"name": "id", "data_type": "4", "type_name": "INTEGER", "length": "10", "not_null": "true"},
                {"name": "customer_id", "data_type": "4", "type_name": "INTEGER", "length": "10", "not_null": "false"},
                {"name": "issued_at", "data_type": "93", "type_name": "TIMESTAMP", "length": "19", "not_null": "false"}
            ],
            "foreign_key": {"customer_id": "customer"}
        }
    }"#;

    fn catalog() -> MetadataCatalog {
        let doc = document::parse(METADATA, false).unwrap();
        MetadataCatalog::from_document(&doc).unwrap()
    }

    // =========================================================================
    // Loading Tests
    // =========================================================================

    #[test]
    fn test_tables_in_file_order() {
        assert_eq!(catalog().tables(), vec!["customer", "order"]);
    }

    #[test]
    fn test_primary_key_and_sequence() {
        let catalog = catalog();
        assert_eq!(catalog.primary_key("customer").unwrap(), Some("id"));
        assert_eq!(catalog.sequence_name("customer").unwrap(), None);
        assert_eq!(catalog.sequence_name("ORDER").unwrap(), Some("gen_order_id"));
    }

    #[test]
    fn test_lookup_is_trimmed_and_lower_cased() {
        let catalog = catalog();
        assert!(catalog.table("  CUSTOMER ").is_ok());
        assert!(catalog.contains("Order"));
    }

    #[test]
    fn test_columns_parsed() {
        let catalog = catalog();
        let columns = catalog.columns("customer").unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].name, "id");
        assert_eq!(columns[0].data_type, codes::INTEGER);
        assert!(columns[0].not_null);
        assert_eq!(columns[1].name, "name");
        assert_eq!(columns[1].length, 60);
        assert_eq!(columns[1].sql_type(), SqlType::String);
    }

    #[test]
    fn test_column_names_match_columns() {
        let catalog = catalog();
        for table in catalog.tables() {
            let names = catalog.column_names(table).unwrap();
            let columns = catalog.columns(table).unwrap();
            assert_eq!(names.len(), columns.len());
            for (name, column) in names.iter().zip(columns) {
                assert_eq!(*name, column.name);
            }
        }
    }

    #[test]
    fn test_referenced_tables() {
        let catalog = catalog();
        let keys = catalog.referenced_tables("order").unwrap();
        assert_eq!(
            keys,
            &[ForeignKey {
                column: "customer_id".to_string(),
                table: "customer".to_string()
            }]
        );
        assert!(catalog.referenced_tables("customer").unwrap().is_empty());
    }

    #[test]
    fn test_typed_accessors() {
        let catalog = catalog();
        let types = catalog.column_types("order").unwrap();
        assert_eq!(types[2], ("issued_at", SqlType::Timestamp));
        let lengths = catalog.column_lengths("order").unwrap();
        assert_eq!(lengths[0], ("id", 10));
        let not_null = catalog.column_not_null("order").unwrap();
        assert_eq!(not_null, vec![("id", true), ("customer_id", false), ("issued_at", false)]);
    }

    // =========================================================================
    // Error Tests
    // =========================================================================

    #[test]
    fn test_unknown_table() {
        let err = catalog().columns("invoice").unwrap_err();
        assert!(matches!(err, EngineError::Metadata(_)));
        assert!(err.to_string().contains("invoice"));
    }

    #[test]
    fn test_missing_file() {
        let err = MetadataCatalog::load("/nonexistent/metadata.json", false).unwrap_err();
        assert!(matches!(err, EngineError::Metadata(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_column_number() {
        let doc = document::parse(
            r#"{"t": {"primary_key": "id", "columns": [{"name": "id", "data_type": "int"}]}}"#,
            false,
        )
        .unwrap();
        let err = MetadataCatalog::from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("data_type"));
    }

    #[test]
    fn test_root_must_be_object() {
        let doc = document::parse(r#"[{"a": "b"}]"#, false).unwrap();
        assert!(MetadataCatalog::from_document(&doc).is_err());
    }

    // =========================================================================
    // Builder and Writer Tests
    // =========================================================================

    #[test]
    fn test_builder_canonicalizes() {
        let table = TableMetadata::new(" Invoice ")
            .primary_key("ID")
            .sequence("")
            .column(ColumnMetadata::new("ID", codes::INTEGER).not_null())
            .foreign_key("Customer_ID", "CUSTOMER");

        assert_eq!(table.name, "invoice");
        assert_eq!(table.primary_key.as_deref(), Some("id"));
        assert_eq!(table.sequence, None);
        assert_eq!(table.foreign_keys[0].column, "customer_id");
        assert!(table.find_column("Id").is_some());
    }

    #[test]
    fn test_to_document_round_trip() {
        let original = catalog();
        let text = original.to_document().to_string();
        let reparsed = MetadataCatalog::from_document(&document::parse(&text, false).unwrap()).unwrap();
        assert_eq!(reparsed, original);
    }

    #[test]
    fn test_to_document_writes_strings() {
        let doc = catalog().to_document();
        let column = &doc.get("order").unwrap().get("columns").unwrap().as_array().unwrap()[2];
        assert_eq!(column.get("data_type"), Some(&Document::from("93")));
        assert_eq!(column.get("type"), Some(&Document::from("timestamp")));
        assert_eq!(column.get("not_null"), Some(&Document::from("false")));
    }

    #[test]
    fn test_insert_replaces_table() {
        let mut catalog = catalog();
        catalog.insert(TableMetadata::new("customer").primary_key("code"));
        assert_eq!(catalog.tables().len(), 2);
        assert_eq!(catalog.primary_key("customer").unwrap(), Some("code"));
    }

    #[test]
    fn test_serialize_table() {
        let table = TableMetadata::new("order").primary_key("id").foreign_key("customer_id", "customer");
        let json = serde_json::to_value(&table).unwrap();
        assert_eq!(json["foreign_keys"]["customer_id"], "customer");
        assert_eq!(json["primary_key"], "id");
    }
}
