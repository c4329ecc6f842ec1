//! QueryEngine - generic read/write access to any cataloged table
//!
//! Ties the lazily loaded catalog, the SQL builders, the materializer and an
//! execution collaborator together.

use tracing::{debug, error};

use crate::catalog::{Catalog, SharedCatalog};
use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{EngineError, Result};
use crate::executor::{QueryExecutor, Row};
use crate::materialize::{self, Listing, ResultEnvelope};
use crate::sql::{Clause, Dialect, DmlGenerator, Query};

/// Parameters of a listing query
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Table to list
    pub table: String,
    /// Optional filter
    pub clause: Option<Clause>,
    /// Sort columns, e.g. `["name", "id DESC"]`
    pub order_by: Vec<String>,
    /// Number of rows to skip
    pub offset: u64,
    /// Page size; the engine's default when `None`
    pub limit: Option<u64>,
}

impl ListRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            clause: None,
            order_by: Vec::new(),
            offset: 0,
            limit: None,
        }
    }

    /// Filter rows
    pub fn clause(mut self, clause: Clause) -> Self {
        self.clause = Some(clause);
        self
    }

    /// Set sort columns
    pub fn order_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set pagination
    pub fn paginate(mut self, offset: u64, limit: u64) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }
}

/// Metadata-driven query engine over an execution collaborator
pub struct QueryEngine<E> {
    catalog: SharedCatalog,
    executor: E,
}

impl<E: QueryExecutor> QueryEngine<E> {
    /// Create an engine; the catalog files are read on first use
    pub fn new(config: EngineConfig, executor: E) -> Self {
        Self {
            catalog: SharedCatalog::new(config),
            executor,
        }
    }

    /// Create an engine over an already built catalog
    pub fn with_catalog(config: EngineConfig, catalog: Catalog, executor: E) -> Self {
        Self {
            catalog: SharedCatalog::from_catalog(config, catalog),
            executor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.catalog.config()
    }

    /// The catalog, loading it on first access
    pub fn catalog(&self) -> Result<&Catalog> {
        self.catalog.get()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn dialect(&self) -> Dialect {
        self.executor.dialect()
    }

    /// Start a query over `table` in the executor's dialect
    pub fn query(&self, table: &str) -> Result<Query> {
        Query::build(self.catalog()?.metadata(), self.dialect(), table)
    }

    /// Prefix search over the table and its references, one page at a time
    pub async fn search(
        &self,
        table: &str,
        term: &str,
        offset: Option<u64>,
        limit: Option<u64>,
    ) -> Result<Listing> {
        let catalog = self.catalog()?;
        let clause = Clause::create(table).like(catalog.metadata(), term)?;
        let query = self
            .query(table)?
            .set_clause(clause)?
            .set_limit(
                offset.unwrap_or(0),
                limit.unwrap_or(self.config().default_limit),
            )?;

        let rows = query.rows(&self.executor).await?;
        materialize::listing(catalog, query.table(), &rows)
    }

    /// Filtered, sorted, paginated listing
    pub async fn list(&self, request: ListRequest) -> Result<Vec<ResultEnvelope>> {
        let catalog = self.catalog()?;
        let mut query = self.query(&request.table)?;
        if let Some(clause) = request.clause {
            query = query.set_clause(clause)?;
        }
        if !request.order_by.is_empty() {
            query = query.order_by(&request.order_by)?;
        }
        query = query.set_limit(
            request.offset,
            request.limit.unwrap_or(self.config().default_limit),
        )?;

        let rows = query.rows(&self.executor).await?;
        self.envelopes(catalog, query.table(), &rows)
    }

    /// One row by primary key
    pub async fn get(&self, table: &str, key: impl Into<Document>) -> Result<Option<ResultEnvelope>> {
        let catalog = self.catalog()?;
        let meta = catalog.metadata().table(table)?;
        let pk = meta.primary_key.as_deref().ok_or_else(|| {
            EngineError::query_build(format!("Table '{}' has no primary key", meta.name))
        })?;

        let query = self
            .query(&meta.name)?
            .set_clause(Clause::create(&meta.name).equal(pk, key))?;
        let rows = query.rows(&self.executor).await?;

        Ok(self.envelopes(catalog, &meta.name, &rows[..rows.len().min(1)])?.pop())
    }

    /// Number of rows, optionally filtered by a clause on the table's own columns
    pub async fn count(&self, table: &str, clause: Option<&Clause>) -> Result<u64> {
        let sql = self.dml()?.generate_count(table, clause)?;
        let rows = self.fetch(table, &sql).await?;
        let value = first_value(&rows).and_then(Document::to_text);
        match value {
            None => Ok(0),
            Some(text) => text.trim().parse::<u64>().map_err(|_| {
                EngineError::execution(table, format!("Unexpected count value '{}'", text))
            }),
        }
    }

    /// Highest primary key value, `None` for an empty table
    pub async fn max_id(&self, table: &str) -> Result<Option<Document>> {
        let sql = self.dml()?.generate_max_id(table)?;
        let rows = self.fetch(table, &sql).await?;
        Ok(first_value(&rows).filter(|v| !v.is_null()).cloned())
    }

    /// Insert a row from a document keyed by column name.
    ///
    /// Returns the new primary key where the dialect reports it back; `None`
    /// otherwise, or when the table has no key.
    pub async fn insert(&self, table: &str, data: &Document) -> Result<Option<Document>> {
        let meta = self.catalog()?.metadata().table(table)?;
        let sql = self.dml()?.generate_insert(table, data)?;

        if meta.primary_key.is_some() && self.dialect().returns_generated_keys() {
            let rows = self.fetch(table, &sql).await?;
            return Ok(first_value(&rows).filter(|v| !v.is_null()).cloned());
        }

        self.execute(table, &sql).await?;
        Ok(None)
    }

    /// Update the row identified by the key value in `data`
    pub async fn update(&self, table: &str, data: &Document) -> Result<u64> {
        let sql = self.dml()?.generate_update(table, data)?;
        self.execute(table, &sql).await
    }

    /// Delete the row with primary key `key`
    pub async fn delete(&self, table: &str, key: impl Into<Document>) -> Result<u64> {
        let sql = self.dml()?.generate_delete(table, &key.into())?;
        self.execute(table, &sql).await
    }

    fn dml(&self) -> Result<DmlGenerator<'_>> {
        Ok(DmlGenerator::new(self.catalog()?.metadata(), self.dialect()))
    }

    fn envelopes(&self, catalog: &Catalog, table: &str, rows: &[Row]) -> Result<Vec<ResultEnvelope>> {
        rows.iter()
            .map(|row| {
                let data = materialize::materialize(catalog.metadata(), table, row)?;
                materialize::envelope(catalog, table, data)
            })
            .collect()
    }

    async fn fetch(&self, table: &str, sql: &str) -> Result<Vec<Row>> {
        debug!(table = %table, dialect = %self.dialect(), sql = %sql, "Running query");
        self.executor.fetch_all(sql).await.map_err(|e| {
            error!(table = %table, sql = %sql, error = %e, "Query failed");
            EngineError::execution(table, e)
        })
    }

    async fn execute(&self, table: &str, sql: &str) -> Result<u64> {
        debug!(table = %table, dialect = %self.dialect(), sql = %sql, "Running statement");
        self.executor.execute(sql).await.map_err(|e| {
            error!(table = %table, sql = %sql, error = %e, "Statement failed");
            EngineError::execution(table, e)
        })
    }
}

fn first_value(rows: &[Row]) -> Option<&Document> {
    rows.first()
        .and_then(|row| row.iter().next())
        .map(|(_, value)| value)
}
