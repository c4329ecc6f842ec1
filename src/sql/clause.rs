//! Predicate builder
//!
//! A `Clause` is a boolean expression scoped to one table. Comparison methods
//! set its body; `and`/`or` open a sub-clause (optionally on another table) and
//! splice it in with the given connective:
//!
//! ```
//! use schema_query::Clause;
//!
//! let clause = Clause::create("customer")
//!     .equal("id", 5)
//!     .and("customer")
//!     .greater("age", 18);
//!
//! assert_eq!(clause.to_sql().unwrap(), "customer.id = '5' AND customer.age > '18'");
//! ```
//!
//! Values are kept until rendering and then embedded as literals quoted for the
//! target dialect; null and blank values render `NULL`. Invalid table or column
//! names do not panic: the first one is remembered and reported on rendering.

use std::collections::HashSet;

use crate::catalog::MetadataCatalog;
use crate::document::Document;
use crate::error::{EngineError, Result};
use crate::sql::dialect::Dialect;
use crate::sql::sanitize::{canonical_name, validate_identifier};

/// Boolean connective between sub-clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    fn as_sql(&self) -> &'static str {
        match self {
            Connective::And => " AND ",
            Connective::Or => " OR ",
        }
    }
}

/// A single predicate over qualified `table.column` names
#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    Compare {
        column: String,
        op: &'static str,
        value: Document,
    },
    Null {
        column: String,
        negated: bool,
    },
    Between {
        column: String,
        low: Document,
        high: Document,
    },
    Members {
        column: String,
        values: Vec<Document>,
        negated: bool,
    },
    Search {
        columns: Vec<String>,
        term: String,
    },
}

impl Predicate {
    fn render(&self, dialect: Dialect, out: &mut String) {
        let text = match self {
            Predicate::Compare { column, op, value } => {
                format!("{} {} {}", column, op, dialect.quote_literal(value))
            }
            Predicate::Null { column, negated } => {
                let not = if *negated { " NOT" } else { "" };
                format!("{} IS{} NULL", column, not)
            }
            Predicate::Between { column, low, high } => format!(
                "{} BETWEEN {} AND {}",
                column,
                dialect.quote_literal(low),
                dialect.quote_literal(high)
            ),
            Predicate::Members {
                column,
                values,
                negated,
            } => {
                let list = if values.is_empty() {
                    "NULL".to_string()
                } else {
                    values
                        .iter()
                        .map(|v| dialect.quote_literal(v))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                let not = if *negated { " NOT" } else { "" };
                format!("{}{} IN ({})", column, not, list)
            }
            Predicate::Search { columns, term } => {
                let parts: Vec<String> = columns
                    .iter()
                    .map(|c| dialect.prefix_match(c, term))
                    .collect();
                format!("({})", parts.join(" OR "))
            }
        };
        out.push_str(&text);
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Empty,
    Predicate(Predicate),
    Compound(Connective, Vec<Node>),
}

impl Node {
    fn render(&self, dialect: Dialect, out: &mut String) {
        match self {
            Node::Empty => {}
            Node::Predicate(predicate) => predicate.render(dialect, out),
            Node::Compound(op, parts) => {
                let mut first = true;
                for part in parts.iter().filter(|p| !matches!(p, Node::Empty)) {
                    if !first {
                        out.push_str(op.as_sql());
                    }
                    first = false;
                    match part {
                        Node::Compound(inner, _) if inner != op => {
                            out.push('(');
                            part.render(dialect, out);
                            out.push(')');
                        }
                        _ => part.render(dialect, out),
                    }
                }
            }
        }
    }
}

/// Boolean filter expression over a table
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    table: String,
    node: Node,
    error: Option<String>,
}

impl Clause {
    /// Start an empty clause for `table`
    pub fn create(table: &str) -> Self {
        let table = canonical_name(table);
        let error = validate_identifier(&table).err();
        Self {
            table,
            node: Node::Empty,
            error,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// True when no predicate has been set
    pub fn is_empty(&self) -> bool {
        matches!(self.node, Node::Empty)
    }

    /// Render the SQL boolean expression with the default dialect's quoting
    pub fn to_sql(&self) -> Result<String> {
        self.to_sql_in(Dialect::default())
    }

    /// Render the SQL boolean expression for `dialect`
    pub fn to_sql_in(&self, dialect: Dialect) -> Result<String> {
        if let Some(error) = &self.error {
            return Err(EngineError::query_build(error.clone()));
        }
        let mut out = String::new();
        self.node.render(dialect, &mut out);
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------------

    pub fn equal(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, "=", value.into())
    }

    pub fn not_equal(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, "<>", value.into())
    }

    pub fn less(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, "<", value.into())
    }

    pub fn greater(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, ">", value.into())
    }

    pub fn less_equal(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, "<=", value.into())
    }

    pub fn greater_equal(self, column: &str, value: impl Into<Document>) -> Self {
        self.compare(column, ">=", value.into())
    }

    pub fn is_null(self, column: &str) -> Self {
        self.with_column(column, |column| Predicate::Null {
            column,
            negated: false,
        })
    }

    pub fn is_not_null(self, column: &str) -> Self {
        self.with_column(column, |column| Predicate::Null {
            column,
            negated: true,
        })
    }

    /// Inclusive range
    pub fn between(self, column: &str, low: impl Into<Document>, high: impl Into<Document>) -> Self {
        let (low, high) = (low.into(), high.into());
        self.with_column(column, |column| Predicate::Between { column, low, high })
    }

    /// Set membership; an empty set renders `IN (NULL)` and matches nothing
    pub fn in_list<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Document>,
    {
        self.members(column, values, false)
    }

    pub fn not_in<I, V>(self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Document>,
    {
        self.members(column, values, true)
    }

    /// Case-insensitive prefix search over every column of the table and of
    /// every table it references by foreign key, as one parenthesized OR group
    pub fn like(mut self, catalog: &MetadataCatalog, term: &str) -> Result<Self> {
        if self.error.is_some() {
            return Ok(self);
        }

        let table = catalog.table(&self.table)?;
        let mut columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{}.{}", table.name, c.name))
            .collect();

        let mut seen = HashSet::from([table.name.as_str()]);
        for fk in &table.foreign_keys {
            if fk.table.is_empty() || !seen.insert(fk.table.as_str()) {
                continue;
            }
            let referenced = catalog.table(&fk.table)?;
            columns.extend(
                referenced
                    .columns
                    .iter()
                    .map(|c| format!("{}.{}", referenced.name, c.name)),
            );
        }

        self.node = if columns.is_empty() {
            Node::Empty
        } else {
            Node::Predicate(Predicate::Search {
                columns,
                term: term.to_string(),
            })
        };
        Ok(self)
    }

    // ------------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------------

    /// Continue with `AND` on `table`
    pub fn and(self, table: &str) -> PendingClause {
        PendingClause::new(self, Connective::And, table)
    }

    /// Continue with `OR` on `table`
    pub fn or(self, table: &str) -> PendingClause {
        PendingClause::new(self, Connective::Or, table)
    }

    /// Continue with `AND` on this clause's table
    pub fn and_current(self) -> PendingClause {
        let table = self.table.clone();
        PendingClause::new(self, Connective::And, &table)
    }

    /// Continue with `OR` on this clause's table
    pub fn or_current(self) -> PendingClause {
        let table = self.table.clone();
        PendingClause::new(self, Connective::Or, &table)
    }

    /// Splice a complete clause in with `AND`
    pub fn and_clause(self, other: Clause) -> Self {
        self.join(Connective::And, other)
    }

    /// Splice a complete clause in with `OR`
    pub fn or_clause(self, other: Clause) -> Self {
        self.join(Connective::Or, other)
    }

    fn join(mut self, op: Connective, other: Clause) -> Self {
        if self.error.is_none() {
            self.error = other.error;
        }
        self.node = match (self.node, other.node) {
            (node, Node::Empty) => node,
            (Node::Empty, node) => node,
            (Node::Compound(current, mut parts), node) if current == op => {
                parts.push(node);
                Node::Compound(op, parts)
            }
            (left, right) => Node::Compound(op, vec![left, right]),
        };
        self
    }

    fn compare(self, column: &str, op: &'static str, value: Document) -> Self {
        self.with_column(column, |column| Predicate::Compare { column, op, value })
    }

    fn members<I, V>(self, column: &str, values: I, negated: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Document>,
    {
        let values: Vec<Document> = values.into_iter().map(Into::into).collect();
        self.with_column(column, |column| Predicate::Members {
            column,
            values,
            negated,
        })
    }

    fn with_column(mut self, column: &str, build: impl FnOnce(String) -> Predicate) -> Self {
        let column = canonical_name(column);
        if let Err(e) = validate_identifier(&column) {
            self.error.get_or_insert(e);
            return self;
        }
        let qualified = format!("{}.{}", self.table, column);
        self.node = Node::Predicate(build(qualified));
        self
    }
}

/// A clause waiting for the right-hand side of `and`/`or`.
///
/// Each comparison builds the sub-clause on the pending table and splices it
/// into the parent, returning the parent.
#[derive(Debug, Clone)]
pub struct PendingClause {
    parent: Clause,
    op: Connective,
    child: Clause,
}

impl PendingClause {
    fn new(parent: Clause, op: Connective, table: &str) -> Self {
        Self {
            parent,
            op,
            child: Clause::create(table),
        }
    }

    fn apply(self, build: impl FnOnce(Clause) -> Clause) -> Clause {
        let PendingClause { parent, op, child } = self;
        parent.join(op, build(child))
    }

    /// Splice a clause built elsewhere, grouped as one operand
    pub fn clause(self, clause: Clause) -> Clause {
        self.parent.join(self.op, clause)
    }

    pub fn equal(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.equal(column, value))
    }

    pub fn not_equal(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.not_equal(column, value))
    }

    pub fn less(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.less(column, value))
    }

    pub fn greater(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.greater(column, value))
    }

    pub fn less_equal(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.less_equal(column, value))
    }

    pub fn greater_equal(self, column: &str, value: impl Into<Document>) -> Clause {
        self.apply(|c| c.greater_equal(column, value))
    }

    pub fn is_null(self, column: &str) -> Clause {
        self.apply(|c| c.is_null(column))
    }

    pub fn is_not_null(self, column: &str) -> Clause {
        self.apply(|c| c.is_not_null(column))
    }

    pub fn between(
        self,
        column: &str,
        low: impl Into<Document>,
        high: impl Into<Document>,
    ) -> Clause {
        self.apply(|c| c.between(column, low, high))
    }

    pub fn in_list<I, V>(self, column: &str, values: I) -> Clause
    where
        I: IntoIterator<Item = V>,
        V: Into<Document>,
    {
        self.apply(|c| c.in_list(column, values))
    }

    pub fn not_in<I, V>(self, column: &str, values: I) -> Clause
    where
        I: IntoIterator<Item = V>,
        V: Into<Document>,
    {
        self.apply(|c| c.not_in(column, values))
    }

    pub fn like(self, catalog: &MetadataCatalog, term: &str) -> Result<Clause> {
        let PendingClause { parent, op, child } = self;
        Ok(parent.join(op, child.like(catalog, term)?))
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
                TableMetadata::new("customer")
                    .primary_key("id")
                    .column(ColumnMetadata::new("id", codes::INTEGER))
                    .column(ColumnMetadata::new("name", codes::VARCHAR))
                    .foreign_key("city_id", "city"),
            )
            .with_table(
                TableMetadata::new("city")
                    .primary_key("id")
                    .column(ColumnMetadata::new("name", codes::VARCHAR)),
            )
    }

    // =========================================================================
    // Comparison Tests
    // =========================================================================

    #[test]
    fn test_single_comparisons() {
        let sql = |c: Clause| c.to_sql().unwrap();
        assert_eq!(sql(Clause::create("t").equal("a", "x")), "t.a = 'x'");
        assert_eq!(sql(Clause::create("t").not_equal("a", 1)), "t.a <> '1'");
        assert_eq!(sql(Clause::create("t").less("a", 1)), "t.a < '1'");
        assert_eq!(sql(Clause::create("t").greater("a", 1)), "t.a > '1'");
        assert_eq!(sql(Clause::create("t").less_equal("a", 1)), "t.a <= '1'");
        assert_eq!(sql(Clause::create("t").greater_equal("a", 1)), "t.a >= '1'");
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(Clause::create("t").is_null("a").to_sql().unwrap(), "t.a IS NULL");
        assert_eq!(
            Clause::create("t").is_not_null("a").to_sql().unwrap(),
            "t.a IS NOT NULL"
        );
    }

    #[test]
    fn test_null_and_blank_values_render_null() {
        assert_eq!(
            Clause::create("t").equal("a", Document::Null).to_sql().unwrap(),
            "t.a = NULL"
        );
        assert_eq!(Clause::create("t").equal("a", "").to_sql().unwrap(), "t.a = NULL");
        assert_eq!(
            Clause::create("t").equal("a", None::<i32>).to_sql().unwrap(),
            "t.a = NULL"
        );
    }

    #[test]
    fn test_between() {
        assert_eq!(
            Clause::create("sale")
                .between("issued_on", "2024-01-01", "2024-01-31")
                .to_sql()
                .unwrap(),
            "sale.issued_on BETWEEN '2024-01-01' AND '2024-01-31'"
        );
    }

    #[test]
    fn test_in_lists() {
        assert_eq!(
            Clause::create("t").in_list("id", [1, 2, 3]).to_sql().unwrap(),
            "t.id IN ('1', '2', '3')"
        );
        assert_eq!(
            Clause::create("t").not_in("code", vec!["a", "b"]).to_sql().unwrap(),
            "t.code NOT IN ('a', 'b')"
        );
        assert_eq!(
            Clause::create("t").in_list("id", Vec::<i32>::new()).to_sql().unwrap(),
            "t.id IN (NULL)"
        );
    }

    #[test]
    fn test_literal_quotes_escaped() {
        assert_eq!(
            Clause::create("t").equal("name", "d'avila").to_sql().unwrap(),
            "t.name = 'd''avila'"
        );
    }

    #[test]
    fn test_default_rendering_escapes_mysql_backslash() {
        let clause = Clause::create("customer").equal("name", r"\' OR 1=1 -- ");
        assert_eq!(clause.to_sql().unwrap(), r"customer.name = '\\'' OR 1=1 -- '");
        assert_eq!(
            clause.to_sql_in(Dialect::Postgres).unwrap(),
            r"customer.name = '\'' OR 1=1 -- '"
        );
    }

    #[test]
    fn test_values_quoted_per_dialect_everywhere() {
        let clause = Clause::create("t")
            .between("a", r"x\", r"y\")
            .and_current()
            .in_list("b", [r"z\"]);
        assert_eq!(
            clause.to_sql_in(Dialect::MySql).unwrap(),
            r"t.a BETWEEN 'x\\' AND 'y\\' AND t.b IN ('z\\')"
        );
        assert_eq!(
            clause.to_sql_in(Dialect::Firebird).unwrap(),
            r"t.a BETWEEN 'x\' AND 'y\' AND t.b IN ('z\')"
        );
    }

    #[test]
    fn test_names_canonicalized() {
        assert_eq!(
            Clause::create(" Customer ").equal("Name", "x").to_sql().unwrap(),
            "customer.name = 'x'"
        );
    }

    #[test]
    fn test_empty_clause() {
        let clause = Clause::create("t");
        assert!(clause.is_empty());
        assert_eq!(clause.to_sql().unwrap(), "");
    }

    // =========================================================================
    // Composition Tests
    // =========================================================================

    #[test]
    fn test_and_on_named_table() {
        let clause = Clause::create("customer")
            .equal("id", 5)
            .and("customer")
            .greater("age", 18);
        assert_eq!(
            clause.to_sql().unwrap(),
            "customer.id = '5' AND customer.age > '18'"
        );
    }

    #[test]
    fn test_cross_table_filter() {
        let clause = Clause::create("order")
            .greater("total", 100)
            .and("customer")
            .equal("name", "Ana");
        assert_eq!(
            clause.to_sql().unwrap(),
            "order.total > '100' AND customer.name = 'Ana'"
        );
    }

    #[test]
    fn test_same_connective_flattens() {
        let clause = Clause::create("t")
            .equal("a", 1)
            .or_current()
            .equal("a", 2)
            .or_current()
            .equal("a", 3);
        assert_eq!(
            clause.to_sql().unwrap(),
            "t.a = '1' OR t.a = '2' OR t.a = '3'"
        );
    }

    #[test]
    fn test_mixed_connectives_are_parenthesized() {
        let clause = Clause::create("t")
            .equal("a", 1)
            .and_current()
            .equal("b", 2)
            .or_current()
            .is_null("c");
        assert_eq!(
            clause.to_sql().unwrap(),
            "(t.a = '1' AND t.b = '2') OR t.c IS NULL"
        );
    }

    #[test]
    fn test_grouped_sub_clause() {
        let group = Clause::create("t").equal("b", 1).or_current().equal("b", 2);
        let clause = Clause::create("t").equal("a", 0).and_current().clause(group);
        assert_eq!(
            clause.to_sql().unwrap(),
            "t.a = '0' AND (t.b = '1' OR t.b = '2')"
        );
    }

    #[test]
    fn test_join_with_empty_sides() {
        let clause = Clause::create("t").and_clause(Clause::create("t").equal("a", 1));
        assert_eq!(clause.to_sql().unwrap(), "t.a = '1'");

        let clause = Clause::create("t").equal("a", 1).or_clause(Clause::create("t"));
        assert_eq!(clause.to_sql().unwrap(), "t.a = '1'");
    }

    // =========================================================================
    // Validation Tests
    // =========================================================================

    #[test]
    fn test_invalid_column_reported() {
        let err = Clause::create("t")
            .equal("a; DROP TABLE t", 1)
            .to_sql()
            .unwrap_err();
        assert!(matches!(err, EngineError::QueryBuild(_)));
    }

    #[test]
    fn test_invalid_table_in_sub_clause_reported() {
        let clause = Clause::create("t").equal("a", 1).and("bad table").equal("b", 2);
        assert!(clause.to_sql().is_err());
    }

    // =========================================================================
    // Like Tests
    // =========================================================================

    #[test]
    fn test_like_covers_referenced_tables() {
        let sql = Clause::create("customer")
            .like(&catalog(), "Ana")
            .unwrap()
            .to_sql()
            .unwrap();

        assert_eq!(
            sql,
            "(LOWER(customer.id) LIKE 'ana%' OR LOWER(customer.name) LIKE 'ana%' OR LOWER(city.name) LIKE 'ana%')"
        );
        assert_eq!(sql.matches(" LIKE ").count(), 3);
        assert!(sql.starts_with('(') && sql.ends_with(')'));
    }

    #[test]
    fn test_like_postgres_casts() {
        let sql = Clause::create("city")
            .like(&catalog(), "po")
            .unwrap()
            .to_sql_in(Dialect::Postgres)
            .unwrap();
        assert_eq!(sql, "(LOWER(CAST(city.name AS VARCHAR)) LIKE 'po%')");
    }

    #[test]
    fn test_like_combined_with_filter() {
        let clause = Clause::create("customer")
            .equal("id", 1)
            .and_current()
            .like(&catalog(), "a")
            .unwrap();
        let sql = clause.to_sql().unwrap();
        assert!(sql.starts_with("customer.id = '1' AND (LOWER(customer.id)"));
    }

    #[test]
    fn test_like_unknown_table() {
        let err = Clause::create("invoice")
            .like(&catalog(), "a")
            .unwrap_err();
        assert!(matches!(err, EngineError::Metadata(_)));
    }

    #[test]
    fn test_like_unknown_referenced_table() {
        let catalog = MetadataCatalog::new().with_table(
            TableMetadata::new("t")
                .column(ColumnMetadata::new("a", codes::VARCHAR))
                .foreign_key("x_id", "missing"),
        );
        assert!(Clause::create("t").like(&catalog, "a").is_err());
    }
}
