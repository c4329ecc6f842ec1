//! Label catalog
//!
//! Human-readable column labels and a display template per table:
//!
//! ```json
//! {"customer": {"to_string": "{name} ({id})", "labels": {"name": "Full name"}}}
//! ```

use std::path::Path;

use crate::catalog::metadata::MetadataCatalog;
use crate::catalog::write_document;
use crate::document::{self, Document, DocumentMap};
use crate::error::{EngineError, Result};
use crate::sql::sanitize::canonical_name;

/// Labels of one table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableLabels {
    /// Template with `{column}` placeholders
    pub to_string: Option<String>,
    /// Column name to display label, in file order
    pub labels: Vec<(String, String)>,
}

impl TableLabels {
    pub fn label(&self, column: &str) -> Option<&str> {
        let column = canonical_name(column);
        self.labels
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, label)| label.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelCatalog {
    tables: Vec<(String, TableLabels)>,
}

impl LabelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse a label file
    pub fn load(path: impl AsRef<Path>, case_sensitive: bool) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::metadata(format!(
                "Label file '{}' not found",
                path.display()
            )));
        }

        let doc = document::parse_file(path, case_sensitive).map_err(|e| {
            EngineError::metadata(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_document(&doc)
    }

    pub fn from_document(doc: &Document) -> Result<Self> {
        let root = match doc {
            Document::Object(map) => map,
            Document::Null => return Ok(Self::new()),
            _ => return Err(EngineError::metadata("Label file root must be an object")),
        };

        let mut catalog = Self::new();
        for (table, entry) in root.iter() {
            let map = entry.as_object().ok_or_else(|| {
                EngineError::metadata(format!("Label entry for table '{}' is not an object", table))
            })?;

            let to_string = map
                .get("to_string")
                .and_then(Document::to_text)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());

            let labels = match map.get("labels") {
                None | Some(Document::Null) => Vec::new(),
                Some(Document::Object(labels)) => labels
                    .iter()
                    .map(|(column, label)| {
                        (canonical_name(column), label.to_text().unwrap_or_default())
                    })
                    .collect(),
                Some(_) => {
                    return Err(EngineError::metadata(format!(
                        "'labels' of table '{}' is not an object",
                        table
                    )));
                }
            };

            catalog.insert(table, TableLabels { to_string, labels });
        }
        Ok(catalog)
    }

    /// Generate labels for every table: `"<TABLE> record ID: {<pk>}"` as the
    /// template and the upper-cased column name with spaces as each label
    pub fn default_for(metadata: &MetadataCatalog) -> Self {
        let mut catalog = Self::new();
        for name in metadata.tables() {
            let Ok(table) = metadata.table(name) else {
                continue;
            };
            let to_string = match &table.primary_key {
                Some(pk) => format!("{} record ID: {{{}}}", name.to_uppercase(), pk),
                None => name.to_uppercase(),
            };
            let labels = table
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.name.replace('_', " ").to_uppercase()))
                .collect();
            catalog.insert(
                name,
                TableLabels {
                    to_string: Some(to_string),
                    labels,
                },
            );
        }
        catalog
    }

    pub fn insert(&mut self, table: &str, labels: TableLabels) {
        let table = canonical_name(table);
        match self.tables.iter_mut().find(|(name, _)| *name == table) {
            Some((_, existing)) => *existing = labels,
            None => self.tables.push((table, labels)),
        }
    }

    pub fn table(&self, table: &str) -> Option<&TableLabels> {
        let table = canonical_name(table);
        self.tables
            .iter()
            .find(|(name, _)| *name == table)
            .map(|(_, labels)| labels)
    }

    pub fn to_string_template(&self, table: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.to_string.as_deref())
    }

    pub fn labels(&self, table: &str) -> Option<&[(String, String)]> {
        self.table(table).map(|t| t.labels.as_slice())
    }

    pub fn label(&self, table: &str, column: &str) -> Option<&str> {
        self.table(table).and_then(|t| t.label(column))
    }

    pub fn to_document(&self) -> Document {
        let map: DocumentMap = self
            .tables
            .iter()
            .map(|(name, table)| {
                let mut entry = DocumentMap::new();
                entry.insert(
                    "to_string",
                    Document::from(table.to_string.clone().unwrap_or_default()),
                );
                let labels: DocumentMap = table
                    .labels
                    .iter()
                    .map(|(column, label)| (column.clone(), Document::from(label)))
                    .collect();
                entry.insert("labels", Document::Object(labels));
                (name.clone(), Document::Object(entry))
            })
            .collect();
        Document::Object(map)
    }

    /// Write the label file, creating parent directories as needed
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        write_document(path.as_ref(), &self.to_document())
    }
}
