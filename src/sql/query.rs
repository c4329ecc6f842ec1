//! Query builder
//!
//! Builds a SELECT over a table and every table it references by foreign key.
//! Each selected column is aliased `"<table>_<column>"`; each reference adds
//!
//! ```text
//! JOIN ref ON CASE WHEN t.fk IS NULL THEN (SELECT MIN(ref.pk) FROM ref) ELSE t.fk END = ref.pk
//! ```
//!
//! so a row with an unset reference joins the referenced row with the smallest
//! key instead of disappearing. The SQL text is compiled once, on first use;
//! after that the query cannot be changed.

use std::sync::OnceLock;

use tracing::{debug, error, warn};

use crate::catalog::{Catalog, MetadataCatalog};
use crate::document::Document;
use crate::error::{EngineError, Result};
use crate::executor::{QueryExecutor, Row};
use crate::materialize;
use crate::sql::clause::Clause;
use crate::sql::dialect::Dialect;
use crate::sql::sanitize::{canonical_name, quote_identifier, validate_identifier};

/// Alias under which `table.column` appears in a result row
pub fn column_alias(table: &str, column: &str) -> String {
    format!("{}_{}", table, column)
}

#[derive(Debug, Clone, PartialEq)]
struct Join {
    table: String,
    primary_key: String,
    foreign_key: String,
}

/// A SELECT statement under construction
#[derive(Debug)]
pub struct Query {
    dialect: Dialect,
    table: String,
    /// (table, column) pairs in select-list order
    selected: Vec<(String, String)>,
    joins: Vec<Join>,
    clause: Option<Clause>,
    order: Vec<String>,
    page: Option<(u64, u64)>,
    compiled: OnceLock<String>,
}

impl Query {
    /// Start a query over `table`, synthesizing joins from its foreign keys
    pub fn build(catalog: &MetadataCatalog, dialect: Dialect, table: &str) -> Result<Self> {
        let meta = catalog.table(table)?;
        validate_identifier(&meta.name).map_err(EngineError::query_build)?;

        let mut selected: Vec<(String, String)> = meta
            .columns
            .iter()
            .map(|c| (meta.name.clone(), c.name.clone()))
            .collect();
        let mut joins: Vec<Join> = Vec::new();

        for fk in &meta.foreign_keys {
            if fk.table.is_empty() {
                continue;
            }
            if fk.table == meta.name {
                warn!(table = %meta.name, column = %fk.column, "Skipping self-referencing foreign key");
                continue;
            }
            if joins.iter().any(|j| j.table == fk.table) {
                warn!(
                    table = %meta.name,
                    column = %fk.column,
                    referenced = %fk.table,
                    "Skipping second foreign key to an already joined table"
                );
                continue;
            }

            let referenced = catalog.table(&fk.table)?;
            let primary_key = referenced.primary_key.clone().ok_or_else(|| {
                EngineError::query_build(format!(
                    "Referenced table '{}' has no primary key",
                    referenced.name
                ))
            })?;

            selected.extend(
                referenced
                    .columns
                    .iter()
                    .map(|c| (referenced.name.clone(), c.name.clone())),
            );
            joins.push(Join {
                table: referenced.name.clone(),
                primary_key,
                foreign_key: fk.column.clone(),
            });
        }

        for (table, column) in &selected {
            validate_identifier(table)
                .and_then(|_| validate_identifier(column))
                .map_err(EngineError::query_build)?;
        }

        Ok(Self {
            dialect,
            table: meta.name.clone(),
            selected,
            joins,
            clause: None,
            order: Vec::new(),
            page: None,
            compiled: OnceLock::new(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Referenced tables joined into this query, in join order
    pub fn joined_tables(&self) -> Vec<&str> {
        self.joins.iter().map(|j| j.table.as_str()).collect()
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_compiled() {
            return Err(EngineError::query_build(format!(
                "Query on '{}' is already compiled; build a new query to change it",
                self.table
            )));
        }
        Ok(())
    }

    /// Filter rows with `clause`
    pub fn set_clause(mut self, clause: Clause) -> Result<Self> {
        self.ensure_open()?;
        self.clause = Some(clause);
        Ok(self)
    }

    /// Sort by columns, each written `column`, `column ASC` or `column DESC`.
    ///
    /// Bare columns belong to the query's table; `table.column` may name a
    /// joined table's column.
    pub fn order_by<I, S>(mut self, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ensure_open()?;

        let mut order = Vec::new();
        for expr in columns {
            let expr = expr.as_ref().trim();
            let mut parts = expr.split_whitespace();
            let field = parts.next().unwrap_or_default();
            let direction = parts.next().map(str::to_uppercase);
            if parts.next().is_some() {
                return Err(EngineError::query_build(format!(
                    "Invalid sort expression '{}'",
                    expr
                )));
            }

            let (table, column) = match field.split_once('.') {
                Some((table, column)) => (canonical_name(table), canonical_name(column)),
                None => (self.table.clone(), canonical_name(field)),
            };

            if !self.selected.iter().any(|(t, c)| *t == table && *c == column) {
                return Err(EngineError::query_build(format!(
                    "Invalid sort field: '{}'. Must be a column of '{}' or of a joined table.",
                    field, self.table
                )));
            }

            match direction.as_deref() {
                None => order.push(format!("{}.{}", table, column)),
                Some(dir @ ("ASC" | "DESC")) => order.push(format!("{}.{} {}", table, column, dir)),
                Some(other) => {
                    return Err(EngineError::query_build(format!(
                        "Invalid sort order: '{}'. Must be 'ASC' or 'DESC'.",
                        other
                    )));
                }
            }
        }

        self.order = order;
        Ok(self)
    }

    /// Page the result: skip `offset` rows, return at most `limit`
    pub fn set_limit(mut self, offset: u64, limit: u64) -> Result<Self> {
        self.ensure_open()?;
        self.page = Some((offset, limit));
        Ok(self)
    }

    /// The compiled SQL text; compiles on first call
    pub fn to_sql(&self) -> Result<&str> {
        if let Some(sql) = self.compiled.get() {
            return Ok(sql);
        }
        let sql = self.compile()?;
        debug!(table = %self.table, sql = %sql, "Compiled query");
        Ok(self.compiled.get_or_init(|| sql))
    }

    fn compile(&self) -> Result<String> {
        let columns: Vec<String> = self
            .selected
            .iter()
            .map(|(table, column)| {
                format!(
                    "{}.{} AS {}",
                    table,
                    column,
                    quote_identifier(&column_alias(table, column))
                )
            })
            .collect();

        let mut sql = format!("SELECT {} FROM {}", columns.join(", "), self.table);

        for join in &self.joins {
            sql.push_str(&format!(
                " JOIN {ref_table} ON CASE WHEN {table}.{fk} IS NULL THEN (SELECT MIN({ref_table}.{pk}) FROM {ref_table}) ELSE {table}.{fk} END = {ref_table}.{pk}",
                ref_table = join.table,
                pk = join.primary_key,
                table = self.table,
                fk = join.foreign_key,
            ));
        }

        if let Some(clause) = &self.clause {
            let predicate = clause.to_sql_in(self.dialect)?;
            if !predicate.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&predicate);
            }
        }

        if !self.order.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order.join(", "));
        }

        if let Some((offset, limit)) = self.page {
            sql = self.dialect.paginate(&sql, offset, limit);
        }

        Ok(sql)
    }

    /// Execute and return the raw aliased rows
    pub async fn rows<E: QueryExecutor>(&self, executor: &E) -> Result<Vec<Row>> {
        let sql = self.to_sql()?;
        executor.fetch_all(sql).await.map_err(|e| {
            error!(table = %self.table, sql = %sql, error = %e, "Query failed");
            EngineError::execution(&self.table, e)
        })
    }

    /// Execute and materialize every row as a nested document
    pub async fn documents<E: QueryExecutor>(
        &self,
        executor: &E,
        catalog: &Catalog,
    ) -> Result<Vec<Document>> {
        let rows = self.rows(executor).await?;
        rows.iter()
            .map(|row| materialize::materialize(catalog.metadata(), &self.table, row))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnMetadata, TableMetadata};
    use crate::types::codes;

    fn catalog() -> MetadataCatalog {
        MetadataCatalog::new()
            .with_table(
                TableMetadata::new("sale")
                    .primary_key("id")
                    .column(ColumnMetadata::new("id", codes::INTEGER))
                    .column(ColumnMetadata::new("customer_id", codes::INTEGER))
                    .column(ColumnMetadata::new("total", codes::DECIMAL))
                    .foreign_key("customer_id", "customer"),
            )
            .with_table(
                TableMetadata::new("customer")
                    .primary_key("id")
                    .column(ColumnMetadata::new("id", codes::INTEGER))
                    .column(ColumnMetadata::new("name", codes::VARCHAR)),
            )
            .with_table(
                TableMetadata::new("note")
                    .column(ColumnMetadata::new("text", codes::VARCHAR)),
            )
    }

    const SALE_SELECT: &str = "SELECT sale.id AS \"sale_id\", sale.customer_id AS \"sale_customer_id\", sale.total AS \"sale_total\", customer.id AS \"customer_id\", customer.name AS \"customer_name\" FROM sale JOIN customer ON CASE WHEN sale.customer_id IS NULL THEN (SELECT MIN(customer.id) FROM customer) ELSE sale.customer_id END = customer.id";

    // =========================================================================
    // Select and Join Tests
    // =========================================================================

    #[test]
    fn test_plain_table() {
        let query = Query::build(&catalog(), Dialect::MySql, "customer").unwrap();
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT customer.id AS \"customer_id\", customer.name AS \"customer_name\" FROM customer"
        );
        assert!(query.joined_tables().is_empty());
    }

    #[test]
    fn test_join_synthesis() {
        let query = Query::build(&catalog(), Dialect::MySql, "Sale").unwrap();
        let sql = query.to_sql().unwrap();

        assert_eq!(sql, SALE_SELECT);
        assert!(sql.contains(
            "CASE WHEN sale.customer_id IS NULL THEN (SELECT MIN(customer.id) FROM customer) ELSE sale.customer_id END = customer.id"
        ));
        assert_eq!(query.joined_tables(), vec!["customer"]);
    }

    #[test]
    fn test_empty_reference_skipped() {
        let catalog = catalog().with_table(
            TableMetadata::new("tag")
                .primary_key("id")
                .column(ColumnMetadata::new("id", codes::INTEGER))
                .foreign_key("owner_id", ""),
        );
        let query = Query::build(&catalog, Dialect::MySql, "tag").unwrap();
        assert!(!query.to_sql().unwrap().contains("JOIN"));
    }

    #[test]
    fn test_self_reference_skipped() {
        let catalog = catalog().with_table(
            TableMetadata::new("category")
                .primary_key("id")
                .column(ColumnMetadata::new("id", codes::INTEGER))
                .column(ColumnMetadata::new("parent_id", codes::INTEGER))
                .foreign_key("parent_id", "category"),
        );
        let query = Query::build(&catalog, Dialect::MySql, "category").unwrap();
        assert!(!query.to_sql().unwrap().contains("JOIN"));
    }

    #[test]
    fn test_referenced_table_without_primary_key() {
        let catalog = catalog().with_table(
            TableMetadata::new("memo")
                .primary_key("id")
                .column(ColumnMetadata::new("id", codes::INTEGER))
                .foreign_key("note_id", "note"),
        );
        let err = Query::build(&catalog, Dialect::MySql, "memo").unwrap_err();
        assert!(matches!(err, EngineError::QueryBuild(_)));
    }

    #[test]
    fn test_unknown_tables() {
        assert!(matches!(
            Query::build(&catalog(), Dialect::MySql, "invoice").unwrap_err(),
            EngineError::Metadata(_)
        ));

        let catalog = catalog().with_table(
            TableMetadata::new("memo")
                .primary_key("id")
                .column(ColumnMetadata::new("id", codes::INTEGER))
                .foreign_key("x_id", "missing"),
        );
        assert!(Query::build(&catalog, Dialect::MySql, "memo").is_err());
    }

    // =========================================================================
    // Clause, Order and Pagination Tests
    // =========================================================================

    #[test]
    fn test_where_clause() {
        let query = Query::build(&catalog(), Dialect::MySql, "customer")
            .unwrap()
            .set_clause(Clause::create("customer").equal("name", "Ana"))
            .unwrap();
        assert!(query
            .to_sql()
            .unwrap()
            .ends_with(" FROM customer WHERE customer.name = 'Ana'"));
    }

    #[test]
    fn test_empty_clause_adds_no_where() {
        let query = Query::build(&catalog(), Dialect::MySql, "customer")
            .unwrap()
            .set_clause(Clause::create("customer"))
            .unwrap();
        assert!(!query.to_sql().unwrap().contains("WHERE"));
    }

    #[test]
    fn test_invalid_clause_fails_compile() {
        let query = Query::build(&catalog(), Dialect::MySql, "customer")
            .unwrap()
            .set_clause(Clause::create("customer").equal("bad column", 1))
            .unwrap();
        assert!(query.to_sql().is_err());
        assert!(!query.is_compiled());
    }

    #[test]
    fn test_order_by() {
        let query = Query::build(&catalog(), Dialect::MySql, "sale")
            .unwrap()
            .order_by(["total desc", "id", "customer.name ASC"])
            .unwrap();
        assert!(query
            .to_sql()
            .unwrap()
            .ends_with(" ORDER BY sale.total DESC, sale.id, customer.name ASC"));
    }

    #[test]
    fn test_order_by_rejects_unknown_column_and_direction() {
        let build = || Query::build(&catalog(), Dialect::MySql, "sale").unwrap();
        assert!(build().order_by(["missing"]).is_err());
        assert!(build().order_by(["total sideways"]).is_err());
        assert!(build().order_by(["total; DROP TABLE sale"]).is_err());
    }

    #[test]
    fn test_pagination_per_dialect() {
        let sql = |dialect| {
            Query::build(&catalog(), dialect, "customer")
                .unwrap()
                .set_limit(10, 20)
                .unwrap()
                .to_sql()
                .unwrap()
                .to_string()
        };

        assert!(sql(Dialect::MySql).ends_with(" FROM customer LIMIT 10, 20"));
        assert!(sql(Dialect::Postgres).ends_with(" FROM customer LIMIT 20 OFFSET 10"));
        assert!(sql(Dialect::Derby).ends_with(" OFFSET 10 ROWS FETCH NEXT 20 ROWS ONLY"));
        assert!(sql(Dialect::Firebird).starts_with("SELECT FIRST 20 SKIP 10 customer.id AS"));
    }

    #[test]
    fn test_full_statement_order() {
        let query = Query::build(&catalog(), Dialect::Postgres, "sale")
            .unwrap()
            .set_clause(Clause::create("sale").greater("total", 10))
            .unwrap()
            .order_by(["id"])
            .unwrap()
            .set_limit(0, 5)
            .unwrap();
        assert_eq!(
            query.to_sql().unwrap(),
            format!(
                "{} WHERE sale.total > '10' ORDER BY sale.id LIMIT 5 OFFSET 0",
                SALE_SELECT
            )
        );
    }

    // =========================================================================
    // Compilation Tests
    // =========================================================================

    #[test]
    fn test_compiled_once_then_frozen() {
        let query = Query::build(&catalog(), Dialect::MySql, "customer").unwrap();
        let first = query.to_sql().unwrap().to_string();
        assert!(query.is_compiled());
        assert_eq!(query.to_sql().unwrap(), first);

        let err = query.set_limit(0, 1).unwrap_err();
        assert!(err.to_string().contains("already compiled"));
    }

    #[test]
    fn test_clause_rendered_in_query_dialect() {
        let clause = || Clause::create("customer").equal("name", r"\' OR 1=1 -- ");
        let sql = |dialect| {
            Query::build(&catalog(), dialect, "customer")
                .unwrap()
                .set_clause(clause())
                .unwrap()
                .to_sql()
                .unwrap()
                .to_string()
        };

        assert!(sql(Dialect::MySql).ends_with(r" WHERE customer.name = '\\'' OR 1=1 -- '"));
        assert!(sql(Dialect::Postgres).ends_with(r" WHERE customer.name = '\'' OR 1=1 -- '"));
    }

    #[test]
    fn test_search_clause_uses_query_dialect() {
        let query = Query::build(&catalog(), Dialect::Postgres, "customer")
            .unwrap()
            .set_clause(Clause::create("customer").like(&catalog(), "an").unwrap())
            .unwrap();
        assert!(query.to_sql().unwrap().ends_with(
            " WHERE (LOWER(CAST(customer.id AS VARCHAR)) LIKE 'an%' OR LOWER(CAST(customer.name AS VARCHAR)) LIKE 'an%')"
        ));
    }

    #[test]
    fn test_column_alias() {
        assert_eq!(column_alias("order", "customer_id"), "order_customer_id");
    }
}
