//! Column type mapping
//!
//! The metadata file records each column's declared SQL type as a JDBC
//! `java.sql.Types` code (`data_type`). `SqlType` groups those codes into the
//! logical types the engine cares about when rendering and checking values.

use crate::document::Document;

/// JDBC type codes as written in the metadata file
pub mod codes {
    pub const BIT: i32 = -7;
    pub const TINYINT: i32 = -6;
    pub const SMALLINT: i32 = 5;
    pub const INTEGER: i32 = 4;
    pub const BIGINT: i32 = -5;
    pub const FLOAT: i32 = 6;
    pub const REAL: i32 = 7;
    pub const DOUBLE: i32 = 8;
    pub const NUMERIC: i32 = 2;
    pub const DECIMAL: i32 = 3;
    pub const CHAR: i32 = 1;
    pub const VARCHAR: i32 = 12;
    pub const LONGVARCHAR: i32 = -1;
    pub const NCHAR: i32 = -15;
    pub const NVARCHAR: i32 = -9;
    pub const LONGNVARCHAR: i32 = -16;
    pub const DATE: i32 = 91;
    pub const TIME: i32 = 92;
    pub const TIMESTAMP: i32 = 93;
    pub const BINARY: i32 = -2;
    pub const BOOLEAN: i32 = 16;
    pub const BLOB: i32 = 2004;
    pub const CLOB: i32 = 2005;
    pub const OTHER: i32 = 1111;

    /// JDBC code for a PostgreSQL type name (`udt_name` in `information_schema`)
    pub fn from_postgres_type(name: &str) -> i32 {
        match name.trim().to_lowercase().as_str() {
            "int2" | "smallint" => SMALLINT,
            "int4" | "integer" | "serial" => INTEGER,
            "int8" | "bigint" | "bigserial" => BIGINT,
            "numeric" | "decimal" => NUMERIC,
            "float4" | "real" => REAL,
            "float8" | "double precision" => DOUBLE,
            "bool" | "boolean" => BOOLEAN,
            "bpchar" | "char" | "character" => CHAR,
            "varchar" | "character varying" | "text" => VARCHAR,
            "date" => DATE,
            "time" | "timetz" => TIME,
            "timestamp" | "timestamptz" => TIMESTAMP,
            "bytea" => BINARY,
            _ => OTHER,
        }
    }
}

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    /// CHAR, VARCHAR and friends
    String,
    /// TINYINT, SMALLINT, INTEGER, BIGINT
    Integer,
    /// NUMERIC, DECIMAL
    Decimal,
    /// REAL, FLOAT, DOUBLE
    Float,
    /// BIT, BOOLEAN
    Boolean,
    Date,
    Time,
    Timestamp,
    /// BLOB, CLOB, BINARY
    Binary,
    /// Anything the engine does not interpret
    Other,
}

impl SqlType {
    /// Map a JDBC type code
    pub fn from_code(code: i32) -> Self {
        match code {
            codes::CHAR
            | codes::VARCHAR
            | codes::LONGVARCHAR
            | codes::NCHAR
            | codes::NVARCHAR
            | codes::LONGNVARCHAR => SqlType::String,
            codes::TINYINT | codes::SMALLINT | codes::INTEGER | codes::BIGINT => SqlType::Integer,
            codes::NUMERIC | codes::DECIMAL => SqlType::Decimal,
            codes::REAL | codes::FLOAT | codes::DOUBLE => SqlType::Float,
            codes::BIT | codes::BOOLEAN => SqlType::Boolean,
            codes::DATE => SqlType::Date,
            codes::TIME => SqlType::Time,
            codes::TIMESTAMP => SqlType::Timestamp,
            codes::BLOB | codes::CLOB | codes::BINARY => SqlType::Binary,
            _ => SqlType::Other,
        }
    }

    /// Lower-case type name, as written to the metadata file's `type` field
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::String => "string",
            SqlType::Integer => "integer",
            SqlType::Decimal => "decimal",
            SqlType::Float => "float",
            SqlType::Boolean => "boolean",
            SqlType::Date => "date",
            SqlType::Time => "time",
            SqlType::Timestamp => "timestamp",
            SqlType::Binary => "binary",
            SqlType::Other => "other",
        }
    }

    /// Check that a document value can be written to a column of this type.
    ///
    /// Scalars arrive as strings from the document parser, so strings are
    /// coerced the same way numbers and booleans are. Null and blank values
    /// are written as `NULL` and always pass.
    pub fn validate_value(&self, value: &Document) -> Result<(), String> {
        if value.is_blank() {
            return Ok(());
        }

        match (self, value) {
            (SqlType::Integer, Document::Number(n)) if n.is_i64() || n.is_u64() => Ok(()),
            (SqlType::Integer, Document::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("Cannot convert '{}' to integer", s)),
            (SqlType::Decimal | SqlType::Float, Document::Number(_)) => Ok(()),
            (SqlType::Decimal | SqlType::Float, Document::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| format!("Cannot convert '{}' to a number", s)),
            (SqlType::Boolean, Document::Boolean(_)) => Ok(()),
            (SqlType::Boolean, Document::String(s)) => parse_bool(s)
                .map(|_| ())
                .ok_or_else(|| format!("Cannot convert '{}' to boolean", s)),
            (SqlType::Date, Document::String(s)) => {
                chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(|_| ())
                    .map_err(|e| format!("Invalid date '{}': {}", s, e))
            }
            (SqlType::Time, Document::String(s)) => {
                chrono::NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                    .map(|_| ())
                    .map_err(|e| format!("Invalid time '{}': {}", s, e))
            }
            (SqlType::Timestamp, Document::String(s)) => parse_timestamp(s.trim())
                .map(|_| ())
                .ok_or_else(|| format!("Invalid timestamp '{}'", s)),
            (SqlType::String | SqlType::Binary | SqlType::Other, Document::String(_))
            | (SqlType::String | SqlType::Other, Document::Number(_) | Document::Boolean(_)) => {
                Ok(())
            }
            _ => Err(format!("Type mismatch: expected {:?}, got {}", self, value)),
        }
    }
}

/// Boolean spellings accepted for boolean columns
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "sim" => Some(true),
        "false" | "0" | "no" | "nao" | "não" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .ok()
        .or_else(|| {
            ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"]
                .iter()
                .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Code Mapping Tests
    // =========================================================================

    #[test]
    fn test_from_code_strings() {
        assert_eq!(SqlType::from_code(codes::VARCHAR), SqlType::String);
        assert_eq!(SqlType::from_code(codes::CHAR), SqlType::String);
        assert_eq!(SqlType::from_code(codes::LONGNVARCHAR), SqlType::String);
    }

    #[test]
    fn test_from_code_numbers() {
        assert_eq!(SqlType::from_code(codes::INTEGER), SqlType::Integer);
        assert_eq!(SqlType::from_code(codes::BIGINT), SqlType::Integer);
        assert_eq!(SqlType::from_code(codes::SMALLINT), SqlType::Integer);
        assert_eq!(SqlType::from_code(codes::DECIMAL), SqlType::Decimal);
        assert_eq!(SqlType::from_code(codes::DOUBLE), SqlType::Float);
    }

    #[test]
    fn test_from_code_temporal_and_other() {
        assert_eq!(SqlType::from_code(codes::DATE), SqlType::Date);
        assert_eq!(SqlType::from_code(codes::TIMESTAMP), SqlType::Timestamp);
        assert_eq!(SqlType::from_code(codes::BLOB), SqlType::Binary);
        assert_eq!(SqlType::from_code(1111), SqlType::Other);
    }

    #[test]
    fn test_sql_type_names() {
        assert_eq!(SqlType::Timestamp.as_str(), "timestamp");
        assert_eq!(SqlType::from_code(codes::NVARCHAR).as_str(), "string");
    }

    #[test]
    fn test_from_postgres_type() {
        assert_eq!(codes::from_postgres_type("int4"), codes::INTEGER);
        assert_eq!(codes::from_postgres_type("INT8"), codes::BIGINT);
        assert_eq!(codes::from_postgres_type("text"), codes::VARCHAR);
        assert_eq!(codes::from_postgres_type("bpchar"), codes::CHAR);
        assert_eq!(codes::from_postgres_type("timestamptz"), codes::TIMESTAMP);
        assert_eq!(codes::from_postgres_type("numeric"), codes::NUMERIC);
        assert_eq!(codes::from_postgres_type("uuid"), codes::OTHER);
    }

    // =========================================================================
    // Value Validation Tests
    // =========================================================================

    #[test]
    fn test_validate_null_always_ok() {
        assert!(SqlType::Integer.validate_value(&Document::Null).is_ok());
        assert!(SqlType::Date.validate_value(&Document::Null).is_ok());
    }

    #[test]
    fn test_validate_blank_always_ok() {
        assert!(SqlType::Integer.validate_value(&Document::from("")).is_ok());
        assert!(SqlType::Date.validate_value(&Document::from("  ")).is_ok());
        assert!(SqlType::Boolean.validate_value(&Document::from("")).is_ok());
        assert!(SqlType::Decimal.validate_value(&Document::from("")).is_ok());
    }

    #[test]
    fn test_validate_integer() {
        let t = SqlType::Integer;
        assert!(t.validate_value(&Document::from(12)).is_ok());
        assert!(t.validate_value(&Document::from(" -7 ")).is_ok());
        assert!(t.validate_value(&Document::from("1.5")).is_err());
        assert!(t.validate_value(&Document::from(1.5)).is_err());
        assert!(t.validate_value(&Document::from(true)).is_err());
    }

    #[test]
    fn test_validate_decimal() {
        let t = SqlType::Decimal;
        assert!(t.validate_value(&Document::from("10.25")).is_ok());
        assert!(t.validate_value(&Document::from(3)).is_ok());
        assert!(t.validate_value(&Document::from("ten")).is_err());
    }

    #[test]
    fn test_validate_boolean() {
        let t = SqlType::Boolean;
        assert!(t.validate_value(&Document::from(true)).is_ok());
        assert!(t.validate_value(&Document::from("Sim")).is_ok());
        assert!(t.validate_value(&Document::from("0")).is_ok());
        assert!(t.validate_value(&Document::from("maybe")).is_err());
    }

    #[test]
    fn test_validate_temporal() {
        assert!(SqlType::Date.validate_value(&Document::from("2024-02-29")).is_ok());
        assert!(SqlType::Date.validate_value(&Document::from("29/02/2024")).is_err());
        assert!(SqlType::Time.validate_value(&Document::from("10:30:00")).is_ok());
        assert!(
            SqlType::Timestamp
                .validate_value(&Document::from("2024-01-15 10:30:00"))
                .is_ok()
        );
        assert!(
            SqlType::Timestamp
                .validate_value(&Document::from("2024-01-15T10:30:00Z"))
                .is_ok()
        );
        assert!(SqlType::Timestamp.validate_value(&Document::from("soon")).is_err());
    }

    #[test]
    fn test_validate_string_accepts_scalars_only() {
        let t = SqlType::String;
        assert!(t.validate_value(&Document::from("x")).is_ok());
        assert!(t.validate_value(&Document::from(5)).is_ok());
        assert!(t.validate_value(&Document::object()).is_err());
    }

    #[test]
    fn test_parse_bool_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("yes"), Some(true));
        assert_eq!(parse_bool("no"), Some(false));
        assert_eq!(parse_bool(""), None);
    }
}
