//! # schema-query
//!
//! A metadata-driven dynamic SQL query engine.
//!
//! Tables are described by a metadata file (columns, primary key, sequence,
//! foreign keys) and an optional label file (display labels and a per-table
//! display template). From those descriptions the engine can filter, search,
//! page, count, insert, update and delete rows of any table without
//! per-entity code, and returns rows as nested JSON-like documents.
//!
//! ## Features
//!
//! - **Document Model**: loosely typed JSON tree with case-insensitive keys and
//!   a hand-written parser
//! - **Catalogs**: metadata and label files loaded once, shared read-only
//! - **Clauses**: comparisons, ranges, set membership, null checks and a
//!   prefix search across a table and everything it references
//! - **Join Synthesis**: every foreign key becomes a JOIN, aliased
//!   `<table>_<column>`
//! - **Dialects**: Firebird, Derby, PostgreSQL and MySQL pagination
//! - **Materialization**: flat rows become nested documents wrapped in a
//!   label/value/data envelope
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use schema_query::{Clause, EngineConfig, ListRequest, PgExecutor, QueryEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::builder()
//!         .metadata_path("config/database/metadata.json")
//!         .labels_path("config/orm.json")
//!         .build();
//!     let executor = PgExecutor::connect("postgres://localhost/mydb").await?;
//!     let engine = QueryEngine::new(config, executor);
//!
//!     // Search a table and everything it references
//!     let listing = engine.search("sale", "ana", None, Some(20)).await?;
//!     println!("{}", serde_json::to_string(&listing)?);
//!
//!     // Filtered listing
//!     let rows = engine
//!         .list(
//!             ListRequest::new("sale")
//!                 .clause(Clause::create("sale").greater("total", 100).and("customer").equal("name", "Ana"))
//!                 .order_by(["total DESC"])
//!                 .paginate(0, 10),
//!         )
//!         .await?;
//!
//!     for row in rows {
//!         println!("{} => {}", row.label, row.data);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use schema_query::{Dialect, EngineConfig};
//!
//! let config = EngineConfig::builder()
//!     .metadata_path("config/database/metadata.json") // default
//!     .without_labels()                               // no label file
//!     .dialect(Dialect::Firebird)
//!     .default_limit(50)
//!     .build();
//! ```

pub mod catalog;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod executor;
pub mod materialize;
pub mod sql;
pub mod types;

// Re-export main types for convenience
pub use catalog::{
    Catalog, ColumnMetadata, ForeignKey, LabelCatalog, MetadataCatalog, SharedCatalog,
    TableLabels, TableMetadata,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use document::{Document, DocumentMap, parse, parse_file};
pub use engine::{ListRequest, QueryEngine};
pub use error::{EngineError, Result};
pub use executor::{PgExecutor, QueryExecutor, Row};
pub use materialize::{Listing, ResultEnvelope, envelope, listing, materialize, render_label};
pub use sql::{Clause, Connective, Dialect, DmlGenerator, PendingClause, Query};
pub use types::SqlType;
