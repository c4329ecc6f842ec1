//! Catalogs
//!
//! `Catalog` bundles the metadata catalog with the optional label catalog and is
//! built once, then shared read-only. `SharedCatalog` defers that build to the
//! first access; concurrent first callers block until the single load finishes.

pub mod labels;
pub mod metadata;

pub use labels::{LabelCatalog, TableLabels};
pub use metadata::{ColumnMetadata, ForeignKey, MetadataCatalog, TableMetadata};

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use tracing::{error, info};

use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{EngineError, Result};

/// Metadata plus labels, read-only after construction
#[derive(Debug, Clone)]
pub struct Catalog {
    metadata: MetadataCatalog,
    labels: Option<LabelCatalog>,
}

impl Catalog {
    /// Combine the two catalogs, attaching labels to the column metadata
    pub fn new(mut metadata: MetadataCatalog, labels: Option<LabelCatalog>) -> Self {
        if let Some(labels) = &labels {
            metadata.attach_labels(labels);
        }
        Self { metadata, labels }
    }

    /// Load both files named by the configuration
    pub fn open(config: &EngineConfig) -> Result<Self> {
        let metadata = MetadataCatalog::load(&config.metadata_path, config.case_sensitive)?;
        info!(
            path = %config.metadata_path.display(),
            tables = metadata.tables().len(),
            "Loaded metadata catalog"
        );

        let labels = match &config.labels_path {
            Some(path) => {
                let labels = LabelCatalog::load(path, config.case_sensitive)?;
                info!(path = %path.display(), "Loaded label catalog");
                Some(labels)
            }
            None => None,
        };

        Ok(Self::new(metadata, labels))
    }

    pub fn metadata(&self) -> &MetadataCatalog {
        &self.metadata
    }

    pub fn labels(&self) -> Option<&LabelCatalog> {
        self.labels.as_ref()
    }

    /// Display template for a table: the label file's `to_string`, or
    /// `"<TABLE> record ID: {<pk>}"` when there is none
    pub fn to_string_template(&self, table: &str) -> Result<String> {
        let meta = self.metadata.table(table)?;
        if let Some(template) = self
            .labels
            .as_ref()
            .and_then(|l| l.to_string_template(&meta.name))
        {
            return Ok(template.to_string());
        }
        Ok(match &meta.primary_key {
            Some(pk) => format!("{} record ID: {{{}}}", meta.name.to_uppercase(), pk),
            None => meta.name.to_uppercase(),
        })
    }
}

/// Lazily loaded, process-wide catalog.
///
/// A failed load is remembered and reported on every later access; it is not
/// retried.
#[derive(Debug)]
pub struct SharedCatalog {
    config: EngineConfig,
    state: OnceLock<std::result::Result<Catalog, String>>,
}

impl SharedCatalog {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            state: OnceLock::new(),
        }
    }

    /// Wrap an already built catalog
    pub fn from_catalog(config: EngineConfig, catalog: Catalog) -> Self {
        let state = OnceLock::new();
        let _ = state.set(Ok(catalog));
        Self { config, state }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the first load has already run
    pub fn is_loaded(&self) -> bool {
        self.state.get().is_some()
    }

    /// Get the catalog, loading it on first access
    pub fn get(&self) -> Result<&Catalog> {
        let state = self.state.get_or_init(|| {
            Catalog::open(&self.config).map_err(|e| {
                error!(error = %e, "Catalog load failed");
                e.to_string()
            })
        });
        state.as_ref().map_err(|msg| EngineError::metadata(msg.clone()))
    }
}

/// Write a document as pretty JSON text, creating parent directories
pub(crate) fn write_document(path: &Path, doc: &Document) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{:#}", doc))?;
    Ok(())
}
