//! Error types for query engine operations

use thiserror::Error;

/// Errors that can occur while parsing documents, reading the catalogs,
/// building SQL or executing it
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Query build error: {0}")]
    QueryBuild(String),

    #[error("Execution error on table '{table}': {message}")]
    Execution { table: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument(msg.into())
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }

    pub fn query_build(msg: impl Into<String>) -> Self {
        Self::QueryBuild(msg.into())
    }

    pub fn execution(table: impl Into<String>, msg: impl ToString) -> Self {
        Self::Execution {
            table: table.into(),
            message: msg.to_string(),
        }
    }

    /// Unknown table in the metadata catalog
    pub fn unknown_table(table: &str) -> Self {
        Self::Metadata(format!("Table '{}' not found in metadata", table))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
