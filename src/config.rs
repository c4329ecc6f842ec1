//! Configuration for QueryEngine
//!
//! Provides a builder pattern for configuring catalog locations and SQL output.

use std::path::PathBuf;

use crate::sql::Dialect;

/// Default location of the metadata description file
pub const DEFAULT_METADATA_PATH: &str = "config/database/metadata.json";

/// Default location of the label description file
pub const DEFAULT_LABELS_PATH: &str = "config/orm.json";

/// Default page size for listings
pub const DEFAULT_LIMIT: u64 = 100;

/// Configuration for the query engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Metadata file (default: "config/database/metadata.json")
    pub metadata_path: PathBuf,
    /// Label file, if labels are used (default: "config/orm.json")
    pub labels_path: Option<PathBuf>,
    /// SQL dialect used when no executor supplies one
    pub dialect: Dialect,
    /// Whether parsed documents compare keys case-sensitively
    pub case_sensitive: bool,
    /// Page size for listings when the caller gives none
    pub default_limit: u64,
}

impl EngineConfig {
    /// Create a new configuration builder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfigBuilder::new().build()
    }
}

/// Builder for EngineConfig
#[derive(Debug)]
pub struct EngineConfigBuilder {
    metadata_path: PathBuf,
    labels_path: Option<PathBuf>,
    dialect: Dialect,
    case_sensitive: bool,
    default_limit: u64,
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineConfigBuilder {
    /// Create a new builder with the default file locations
    pub fn new() -> Self {
        Self {
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
            labels_path: Some(PathBuf::from(DEFAULT_LABELS_PATH)),
            dialect: Dialect::default(),
            case_sensitive: false,
            default_limit: DEFAULT_LIMIT,
        }
    }

    /// Set the metadata file location
    pub fn metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_path = path.into();
        self
    }

    /// Set the label file location
    pub fn labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    /// Do not load a label file
    pub fn without_labels(mut self) -> Self {
        self.labels_path = None;
        self
    }

    /// Set the SQL dialect (default: MySQL)
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Set the dialect from a connection URL
    pub fn dialect_from_url(mut self, url: &str) -> Self {
        self.dialect = Dialect::from_url(url);
        self
    }

    /// Enable or disable case-sensitive document keys (default: false)
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// Set the default listing page size (default: 100)
    pub fn default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit;
        self
    }

    /// Build the configuration
    pub fn build(self) -> EngineConfig {
        EngineConfig {
            metadata_path: self.metadata_path,
            labels_path: self.labels_path,
            dialect: self.dialect,
            case_sensitive: self.case_sensitive,
            default_limit: self.default_limit,
        }
    }
}
