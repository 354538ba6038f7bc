//! Per-document metadata sidecar
//!
//! An optional `metadata.toml` at the corpus root describes source documents,
//! keyed by their path relative to the root:
//!
//! ```toml
//! [documents."aeb_v431.md"]
//! version = "4.3.1"
//! start_date = "2023-01-01"
//! end_date = "2025-12-31"
//! protocol_type = "Test Protocol"
//! system_domain = "Safety Assist"
//! ```
//!
//! Every chunk of a listed document carries these fields, dates as `YYYYMMDD`
//! integers, so searches can be scoped with a `MetadataFilter`.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::store::date_key;
use crate::store::filter::{END_DATE_KEY, PROTOCOL_TYPE_KEY, START_DATE_KEY, VERSION_KEY};

pub const METADATA_FILE: &str = "metadata.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentMetadata {
    pub version: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub protocol_type: Option<String>,
    pub system_domain: Option<String>,
}

/// Sidecar contents, keyed by relative document path
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetadataIndex {
    #[serde(default)]
    documents: BTreeMap<String, DocumentMetadata>,
}

impl MetadataIndex {
    /// Read `metadata.toml` from `dir`; a missing file is an empty index
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(METADATA_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let index = Self::parse(&text).with_context(|| format!("Invalid {}", path.display()))?;
        debug!(path = %path.display(), documents = index.len(), "document metadata loaded");
        Ok(index)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let index: Self = toml::from_str(text)?;
        for (source, meta) in &index.documents {
            meta.fields()
                .with_context(|| format!("Bad metadata for {}", source))?;
        }
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, source: &str) -> Option<&DocumentMetadata> {
        self.documents.get(source)
    }

    /// Merge the fields for `source` into chunk metadata; unlisted sources are untouched
    pub fn apply(&self, source: &str, metadata: &mut Map<String, Value>) -> Result<()> {
        if let Some(meta) = self.get(source) {
            metadata.extend(meta.fields()?);
        }
        Ok(())
    }
}

impl DocumentMetadata {
    fn fields(&self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        if let Some(version) = &self.version {
            fields.insert(VERSION_KEY.to_string(), Value::from(version.trim()));
        }
        if let Some(protocol_type) = &self.protocol_type {
            fields.insert(PROTOCOL_TYPE_KEY.to_string(), Value::from(protocol_type.trim()));
        }
        if let Some(domain) = &self.system_domain {
            fields.insert("system_domain".to_string(), Value::from(domain.trim()));
        }
        if let Some(start) = &self.start_date {
            fields.insert(START_DATE_KEY.to_string(), Value::from(date_key(start)?));
        }
        if let Some(end) = &self.end_date {
            fields.insert(END_DATE_KEY.to_string(), Value::from(date_key(end)?));
        }
        Ok(fields)
    }
}
