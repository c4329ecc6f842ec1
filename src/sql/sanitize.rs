//! SQL identifier and literal utilities
//!
//! Table and column names come from the metadata catalog or from callers; they
//! are canonicalized and checked here before being spliced into SQL text.
//! Values are embedded as quoted literals; see `Dialect::quote_literal`.

use std::sync::LazyLock;

use regex::Regex;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$").unwrap());

/// Canonical form of a table or column name: trimmed and lower-cased
pub fn canonical_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Quote a SQL identifier to make it safe for use in queries
///
/// # Example
/// ```
/// use schema_query::sql::quote_identifier;
///
/// assert_eq!(quote_identifier("order_id"), "\"order_id\"");
/// ```
pub fn quote_identifier(identifier: &str) -> String {
    let escaped = identifier.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Validate a table or column name
///
/// Rules:
/// - Must start with a letter or underscore
/// - Can only contain letters, numbers, underscores and `$`
///
/// # Example
/// ```
/// use schema_query::sql::validate_identifier;
///
/// assert!(validate_identifier("customer_id").is_ok());
/// assert!(validate_identifier("id; DROP TABLE x").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }

    if !IDENTIFIER.is_match(name) {
        return Err(format!(
            "Identifier '{}' is invalid. Must start with a letter or underscore and contain only letters, numbers, underscores and '$'.",
            name
        ));
    }

    Ok(())
}

/// Single-quote a string with embedded quotes doubled
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}
