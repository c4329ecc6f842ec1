//! Result materializer
//!
//! Turns a flat aliased row (`<table>_<column>` labels, as produced by
//! [`Query`](crate::sql::Query)) into a nested document. Each table's own
//! columns become plain keys; each referenced table found in the row is
//! embedded under its table name:
//!
//! ```text
//! sale_id, sale_customer_id, customer_id, customer_name
//!   => {"id": 1, "customer_id": 7, "customer": {"id": 7, "name": "Ana"}}
//! ```

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::catalog::{Catalog, ColumnMetadata, MetadataCatalog, TableMetadata};
use crate::document::{Document, DocumentMap};
use crate::error::Result;
use crate::executor::Row;
use crate::sql::query::column_alias;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").unwrap());

/// One materialized row, ready for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    /// The table's display template with row values substituted
    pub label: String,
    /// Primary key value as text
    pub value: String,
    pub data: Document,
}

/// Listing response: key name, column descriptions and one envelope per row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnMetadata>,
    pub data: Vec<ResultEnvelope>,
}

/// Nest one aliased row under `table`
pub fn materialize(catalog: &MetadataCatalog, table: &str, row: &Row) -> Result<Document> {
    let meta = catalog.table(table)?;
    let mut visiting = Vec::new();
    materialize_table(catalog, meta, row, &mut visiting).map(Document::Object)
}

fn materialize_table<'a>(
    catalog: &'a MetadataCatalog,
    meta: &'a TableMetadata,
    row: &Row,
    visiting: &mut Vec<&'a str>,
) -> Result<DocumentMap> {
    let mut map = DocumentMap::new();
    for column in &meta.columns {
        if let Some(value) = row.get(&column_alias(&meta.name, &column.name)) {
            map.insert(column.name.clone(), value.clone());
        }
    }

    visiting.push(&meta.name);
    for fk in &meta.foreign_keys {
        if fk.table.is_empty() || visiting.contains(&fk.table.as_str()) || map.contains_key(&fk.table) {
            continue;
        }
        let referenced = catalog.table(&fk.table)?;
        let present = referenced
            .columns
            .iter()
            .any(|c| row.contains(&column_alias(&referenced.name, &c.name)));
        if !present {
            continue;
        }
        let nested = materialize_table(catalog, referenced, row, visiting)?;
        map.insert(referenced.name.clone(), Document::Object(nested));
    }
    visiting.pop();

    Ok(map)
}

/// Wrap a materialized row with its display label and key value
pub fn envelope(catalog: &Catalog, table: &str, data: Document) -> Result<ResultEnvelope> {
    let template = catalog.to_string_template(table)?;
    let value = catalog
        .metadata()
        .primary_key(table)?
        .and_then(|pk| data.get(pk))
        .and_then(Document::to_text)
        .unwrap_or_default();

    Ok(ResultEnvelope {
        label: render_label(&template, &data),
        value,
        data,
    })
}

/// Materialize and wrap every row
pub fn listing(catalog: &Catalog, table: &str, rows: &[Row]) -> Result<Listing> {
    let metadata = catalog.metadata();
    let data = rows
        .iter()
        .map(|row| envelope(catalog, table, materialize(metadata, table, row)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(Listing {
        primary_key: metadata.primary_key(table)?.map(str::to_string),
        columns: metadata.columns(table)?.to_vec(),
        data,
    })
}

/// Substitute `{column}` placeholders with values from `data`.
///
/// Dotted placeholders (`{customer.name}`) reach into embedded references.
/// Placeholders whose value is missing, null or blank are removed.
pub fn render_label(template: &str, data: &Document) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            caps[1]
                .split('.')
                .try_fold(data, |node, key| node.get(key))
                .filter(|value| !value.is_blank())
                .and_then(Document::to_text)
                .unwrap_or_default()
        })
        .trim()
        .to_string()
}
