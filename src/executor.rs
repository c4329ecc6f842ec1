//! SQL execution collaborator
//!
//! The engine builds complete SQL text and hands it to a `QueryExecutor`.
//! Executors return fully buffered rows, so no cursor outlives a call.

use std::future::Future;
use std::sync::LazyLock;

use regex::Regex;
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row as _, TypeInfo};
use tracing::info;

use crate::catalog::{ColumnMetadata, ForeignKey, MetadataCatalog, TableMetadata};
use crate::document::Document;
use crate::error::{EngineError, Result};
use crate::sql::{Dialect, canonical_name};
use crate::types::codes;

static NEXTVAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"nextval\('([^']+)'").unwrap());

const TABLES_SQL: &str = "SELECT table_name::text AS table_name \
    FROM information_schema.tables \
    WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
    ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT table_name::text AS table_name, column_name::text AS column_name, \
    udt_name::text AS type_name, \
    COALESCE(character_maximum_length, numeric_precision, 0)::int4 AS length, \
    (is_nullable = 'NO') AS not_null, column_default::text AS column_default \
    FROM information_schema.columns \
    WHERE table_schema = current_schema() \
    ORDER BY table_name, ordinal_position";

const PRIMARY_KEYS_SQL: &str = "SELECT kcu.table_name::text AS table_name, kcu.column_name::text AS column_name \
    FROM information_schema.table_constraints tc \
    JOIN information_schema.key_column_usage kcu \
      ON kcu.constraint_name = tc.constraint_name AND kcu.constraint_schema = tc.constraint_schema \
    WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema = current_schema() \
    ORDER BY kcu.table_name, kcu.ordinal_position";

const FOREIGN_KEYS_SQL: &str = "SELECT kcu.table_name::text AS table_name, kcu.column_name::text AS column_name, \
    ccu.table_name::text AS referenced_table \
    FROM information_schema.referential_constraints rc \
    JOIN information_schema.key_column_usage kcu \
      ON kcu.constraint_name = rc.constraint_name AND kcu.constraint_schema = rc.constraint_schema \
    JOIN information_schema.constraint_column_usage ccu \
      ON ccu.constraint_name = rc.unique_constraint_name AND ccu.constraint_schema = rc.unique_constraint_schema \
    WHERE kcu.table_schema = current_schema() \
    ORDER BY kcu.table_name, kcu.ordinal_position";

/// One result row: column labels and values in select-list order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Document)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append
    pub fn with(mut self, label: impl Into<String>, value: impl Into<Document>) -> Self {
        self.push(label, value);
        self
    }

    pub fn push(&mut self, label: impl Into<String>, value: impl Into<Document>) {
        self.columns.push((label.into(), value.into()));
    }

    /// Value of the first column with this label, compared case-insensitively
    pub fn get(&self, label: &str) -> Option<&Document> {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(label))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Document)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>> FromIterator<(K, Document)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Document)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Runs SQL text against a database
pub trait QueryExecutor {
    /// Dialect the generated SQL must target
    fn dialect(&self) -> Dialect;

    /// Run a query and return every row
    fn fetch_all(&self, sql: &str) -> impl Future<Output = Result<Vec<Row>>> + Send;

    /// Run a statement and return the number of affected rows
    fn execute(&self, sql: &str) -> impl Future<Output = Result<u64>> + Send;
}

/// PostgreSQL executor over a `sqlx` pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect to the database
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(|e| {
            EngineError::execution("", format!("Database connection failed: {}", e))
        })?;
        Ok(Self { pool })
    }

    /// Use an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Build a metadata catalog from the tables of the current schema.
    ///
    /// Reads `information_schema` for tables, columns (type, length,
    /// nullability), the first primary-key column, the key's sequence and
    /// single-column foreign keys.
    pub async fn introspect(&self) -> Result<MetadataCatalog> {
        let table_rows = sqlx::query(TABLES_SQL).fetch_all(&self.pool).await?;
        let mut tables: Vec<TableMetadata> = table_rows
            .iter()
            .map(|row| row.try_get::<String, _>("table_name").map(TableMetadata::new))
            .collect::<std::result::Result<_, _>>()?;

        let mut defaults: Vec<(String, String, String)> = Vec::new();
        for row in sqlx::query(COLUMNS_SQL).fetch_all(&self.pool).await? {
            let table: String = row.try_get("table_name")?;
            let column: String = row.try_get("column_name")?;
            let type_name: String = row.try_get("type_name")?;
            let Some(meta) = find_table(&mut tables, &table) else {
                continue;
            };

            let mut metadata = ColumnMetadata::new(&column, codes::from_postgres_type(&type_name))
                .type_name(type_name.to_uppercase())
                .length(row.try_get("length")?);
            if row.try_get::<bool, _>("not_null")? {
                metadata = metadata.not_null();
            }
            meta.columns.push(metadata);

            if let Some(default) = row.try_get::<Option<String>, _>("column_default")? {
                defaults.push((meta.name.clone(), canonical_name(&column), default));
            }
        }

        for row in sqlx::query(PRIMARY_KEYS_SQL).fetch_all(&self.pool).await? {
            let table: String = row.try_get("table_name")?;
            let column: String = row.try_get("column_name")?;
            if let Some(meta) = find_table(&mut tables, &table) {
                meta.primary_key.get_or_insert(canonical_name(&column));
            }
        }

        for (table, column, default) in &defaults {
            if let Some(meta) = find_table(&mut tables, table) {
                if meta.primary_key.as_deref() == Some(column.as_str()) {
                    meta.sequence = sequence_from_default(default);
                }
            }
        }

        for row in sqlx::query(FOREIGN_KEYS_SQL).fetch_all(&self.pool).await? {
            let table: String = row.try_get("table_name")?;
            let column: String = row.try_get("column_name")?;
            let referenced: String = row.try_get("referenced_table")?;
            if let Some(meta) = find_table(&mut tables, &table) {
                let column = canonical_name(&column);
                if !meta.foreign_keys.iter().any(|fk| fk.column == column) {
                    meta.foreign_keys.push(ForeignKey {
                        column,
                        table: canonical_name(&referenced),
                    });
                }
            }
        }

        info!(tables = tables.len(), "Introspected database schema");
        Ok(tables
            .into_iter()
            .fold(MetadataCatalog::new(), MetadataCatalog::with_table))
    }

    fn decode_row(row: &PgRow) -> Row {
        row.columns()
            .iter()
            .map(|col| {
                let value = Self::decode_column(row, col.ordinal(), col.type_info().name());
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Document {
        match type_name {
            "INT2" => row
                .try_get::<Option<i16>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(i32::from(v)))
                .unwrap_or_default(),
            "INT4" => row
                .try_get::<Option<i32>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
            "INT8" => row
                .try_get::<Option<i64>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
            "NUMERIC" => {
                use rust_decimal::prelude::ToPrimitive;
                row.try_get::<Option<rust_decimal::Decimal>, _>(idx)
                    .ok()
                    .flatten()
                    .and_then(|d| d.to_f64())
                    .map(Document::from)
                    .unwrap_or_default()
            }
            "FLOAT4" => row
                .try_get::<Option<f32>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(f64::from(v)))
                .unwrap_or_default(),
            "FLOAT8" => row
                .try_get::<Option<f64>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
            "BOOL" => row
                .try_get::<Option<bool>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(v.to_rfc3339()))
                .unwrap_or_default(),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(v.format("%Y-%m-%d %H:%M:%S").to_string()))
                .unwrap_or_default(),
            "DATE" => row
                .try_get::<Option<chrono::NaiveDate>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(v.format("%Y-%m-%d").to_string()))
                .unwrap_or_default(),
            "TIME" => row
                .try_get::<Option<chrono::NaiveTime>, _>(idx)
                .ok()
                .flatten()
                .map(|v| Document::from(v.format("%H:%M:%S").to_string()))
                .unwrap_or_default(),
            "JSON" | "JSONB" => row
                .try_get::<Option<serde_json::Value>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
            _ => row
                .try_get::<Option<String>, _>(idx)
                .ok()
                .flatten()
                .map(Document::from)
                .unwrap_or_default(),
        }
    }
}

impl QueryExecutor for PgExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&self, sql: &str) -> Result<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(Self::decode_row).collect())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn find_table<'t>(tables: &'t mut [TableMetadata], name: &str) -> Option<&'t mut TableMetadata> {
    let name = canonical_name(name);
    tables.iter_mut().find(|t| t.name == name)
}

/// Sequence name out of a `nextval('schema.seq'::regclass)` column default
fn sequence_from_default(default: &str) -> Option<String> {
    let captures = NEXTVAL.captures(default)?;
    let qualified = captures.get(1)?.as_str();
    let name = qualified.rsplit('.').next().unwrap_or(qualified);
    let name = canonical_name(name.trim_matches('"'));
    (!name.is_empty()).then_some(name)
}
