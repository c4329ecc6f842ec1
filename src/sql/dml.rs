//! DML generation
//!
//! Builds COUNT/MAX, INSERT, UPDATE and DELETE statements for any cataloged
//! table. Row values come from a document object keyed by column name.

use crate::catalog::{MetadataCatalog, TableMetadata};
use crate::document::Document;
use crate::error::{EngineError, Result};
use crate::sql::clause::Clause;
use crate::sql::dialect::Dialect;
use crate::sql::sanitize::validate_identifier;

/// DML generator over a metadata catalog
pub struct DmlGenerator<'a> {
    catalog: &'a MetadataCatalog,
    dialect: Dialect,
}

impl<'a> DmlGenerator<'a> {
    pub fn new(catalog: &'a MetadataCatalog, dialect: Dialect) -> Self {
        Self { catalog, dialect }
    }

    fn table(&self, table: &str) -> Result<&'a TableMetadata> {
        let meta = self.catalog.table(table)?;
        validate_identifier(&meta.name).map_err(EngineError::query_build)?;
        Ok(meta)
    }

    fn require_primary_key<'t>(meta: &'t TableMetadata, action: &str) -> Result<&'t str> {
        meta.primary_key.as_deref().ok_or_else(|| {
            EngineError::query_build(format!(
                "Cannot {} table '{}' without a primary key",
                action, meta.name
            ))
        })
    }

    /// `SELECT COUNT(pk) FROM t [WHERE ...]`; `COUNT(*)` when the table has no key
    pub fn generate_count(&self, table: &str, clause: Option<&Clause>) -> Result<String> {
        let meta = self.table(table)?;
        let counted = match &meta.primary_key {
            Some(pk) => format!("{}.{}", meta.name, pk),
            None => "*".to_string(),
        };
        let mut sql = format!("SELECT COUNT({}) FROM {}", counted, meta.name);
        if let Some(clause) = clause {
            let predicate = clause.to_sql_in(self.dialect)?;
            if !predicate.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&predicate);
            }
        }
        Ok(sql)
    }

    /// `SELECT MAX(pk) FROM t`
    pub fn generate_max_id(&self, table: &str) -> Result<String> {
        let meta = self.table(table)?;
        let pk = Self::require_primary_key(meta, "take the highest key of")?;
        Ok(format!("SELECT MAX({}.{}) FROM {}", meta.name, pk, meta.name))
    }

    /// INSERT of every non-key column.
    ///
    /// The key is left to the database, except on dialects that draw it from
    /// the table's sequence. Where the dialect supports it the statement ends
    /// with `RETURNING <pk>` so the new key comes back as a one-row result.
    pub fn generate_insert(&self, table: &str, data: &Document) -> Result<String> {
        let meta = self.table(table)?;
        let pk = meta.primary_key.as_deref();

        let mut columns = Vec::new();
        let mut values = Vec::new();

        let generated = pk.zip(meta.sequence.as_deref()).and_then(|(pk, sequence)| {
            self.dialect
                .next_sequence_value(sequence)
                .map(|next| (pk, next))
        });
        if let Some((pk, next)) = generated {
            columns.push(pk.to_string());
            values.push(next);
        }

        for column in meta.columns.iter().filter(|c| Some(c.name.as_str()) != pk) {
            columns.push(column.name.clone());
            values.push(self.literal(meta, &column.name, data)?);
        }

        let mut sql = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", meta.name)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                meta.name,
                columns.join(", "),
                values.join(", ")
            )
        };
        if let Some(pk) = pk.filter(|_| self.dialect.returns_generated_keys()) {
            sql.push_str(" RETURNING ");
            sql.push_str(pk);
        }
        Ok(sql)
    }

    /// UPDATE of every non-key column, keyed on the key value in `data`
    pub fn generate_update(&self, table: &str, data: &Document) -> Result<String> {
        let meta = self.table(table)?;
        let pk = Self::require_primary_key(meta, "update")?;
        let key = data.get(pk).filter(|v| !v.is_blank()).ok_or_else(|| {
            EngineError::query_build(format!(
                "Missing value for key '{}' of table '{}'",
                pk, meta.name
            ))
        })?;

        let assignments = meta
            .columns
            .iter()
            .filter(|c| c.name != pk)
            .map(|c| Ok(format!("{} = {}", c.name, self.literal(meta, &c.name, data)?)))
            .collect::<Result<Vec<_>>>()?;

        if assignments.is_empty() {
            return Err(EngineError::query_build(format!(
                "Table '{}' has no columns to update",
                meta.name
            )));
        }

        Ok(format!(
            "UPDATE {} SET {} WHERE {} = {}",
            meta.name,
            assignments.join(", "),
            pk,
            self.dialect.quote_literal(key)
        ))
    }

    /// DELETE of the row with key `key`
    pub fn generate_delete(&self, table: &str, key: &Document) -> Result<String> {
        let meta = self.table(table)?;
        let pk = Self::require_primary_key(meta, "delete from")?;
        if key.is_blank() {
            return Err(EngineError::query_build(format!(
                "Missing value for key '{}' of table '{}'",
                pk, meta.name
            )));
        }
        Ok(format!(
            "DELETE FROM {} WHERE {} = {}",
            meta.name,
            pk,
            self.dialect.quote_literal(key)
        ))
    }

    fn literal(&self, meta: &TableMetadata, column: &str, data: &Document) -> Result<String> {
        let value = data.get(column).unwrap_or(&Document::Null);
        if let Some(col) = meta.find_column(column) {
            col.sql_type().validate_value(value).map_err(|e| {
                EngineError::query_build(format!("Column '{}.{}': {}", meta.name, column, e))
            })?;
        }
        Ok(self.dialect.quote_literal(value))
    }
}
