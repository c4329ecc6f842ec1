//! SQL dialects
//!
//! The engine emits one SQL text for every vendor except for literal quoting,
//! pagination, the text cast used by prefix search and key generation.

use std::fmt;

use crate::document::Document;
use crate::sql::sanitize::quote_text;

/// Target database vendor, supplied by the execution collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// `SELECT FIRST n SKIP m ...`
    Firebird,
    /// `... OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    Derby,
    /// `... LIMIT n OFFSET m`
    Postgres,
    /// `... LIMIT m, n`; also the fallback for unknown vendors
    #[default]
    MySql,
}

impl Dialect {
    /// Guess the dialect from a JDBC-style connection URL by vendor marker.
    ///
    /// Unknown URLs fall back to `MySql`.
    pub fn from_url(url: &str) -> Self {
        let url = url.to_lowercase();
        if url.contains("firebird") {
            Dialect::Firebird
        } else if url.contains("derby") {
            Dialect::Derby
        } else if url.contains("postgres") {
            Dialect::Postgres
        } else {
            Dialect::MySql
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Firebird => "firebird",
            Dialect::Derby => "derby",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    /// Quote text as a string literal.
    ///
    /// MySQL treats a backslash inside a literal as an escape, so there it is
    /// doubled along with `'`.
    pub fn quote_text(&self, text: &str) -> String {
        match self {
            Dialect::MySql => quote_text(&text.replace('\\', "\\\\")),
            _ => quote_text(text),
        }
    }

    /// Render a value as a SQL literal; null and blank values become `NULL`
    pub fn quote_literal(&self, value: &Document) -> String {
        match value.to_text() {
            Some(text) if !value.is_blank() => self.quote_text(&text),
            _ => "NULL".to_string(),
        }
    }

    /// Whether INSERT can hand back the generated key with `RETURNING`
    pub fn returns_generated_keys(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Apply offset/limit pagination to a complete SELECT statement
    pub fn paginate(&self, sql: &str, offset: u64, limit: u64) -> String {
        match self {
            Dialect::Firebird => {
                let body = sql
                    .get(..6)
                    .filter(|head| head.eq_ignore_ascii_case("SELECT"))
                    .map(|_| sql[6..].trim_start())
                    .unwrap_or(sql);
                format!("SELECT FIRST {} SKIP {} {}", limit, offset, body)
            }
            Dialect::Derby => format!(
                "{} OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                sql, offset, limit
            ),
            Dialect::Postgres => format!("{} LIMIT {} OFFSET {}", sql, limit, offset),
            Dialect::MySql => format!("{} LIMIT {}, {}", sql, offset, limit),
        }
    }

    /// Case-insensitive prefix match of `qualified_column` against `term`.
    ///
    /// `%` and `_` in `term` are not escaped and keep their LIKE wildcard
    /// meaning, so `a_c` also finds `abc`.
    pub fn prefix_match(&self, qualified_column: &str, term: &str) -> String {
        let pattern = self.quote_text(&format!("{}%", term.to_lowercase()));
        match self {
            Dialect::Postgres => format!(
                "LOWER(CAST({} AS VARCHAR)) LIKE {}",
                qualified_column, pattern
            ),
            _ => format!("LOWER({}) LIKE {}", qualified_column, pattern),
        }
    }

    /// Expression producing the next key from a sequence, when the dialect
    /// fills primary keys from generators instead of the database default
    pub fn next_sequence_value(&self, sequence: &str) -> Option<String> {
        match self {
            Dialect::Firebird => Some(format!("GEN_ID({}, 1)", sequence)),
            _ => None,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
