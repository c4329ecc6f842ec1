//! SQL generation
//!
//! Dialects, identifier/literal sanitization, the predicate and query builders
//! and DML statements.

pub mod clause;
pub mod dialect;
pub mod dml;
pub mod query;
pub mod sanitize;

pub use clause::{Clause, Connective, PendingClause};
pub use dialect::Dialect;
pub use dml::DmlGenerator;
pub use query::{Query, column_alias};
pub use sanitize::{canonical_name, quote_identifier, quote_text, validate_identifier};
