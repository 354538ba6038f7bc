//! Metadata scoping for searches
//!
//! Ingestion stamps each chunk with the metadata of its source document:
//! `version`, `protocol_type`, and an effective window `start_date..=end_date`
//! stored as `YYYYMMDD` integers. A filter restricts a search to chunks whose
//! metadata satisfies every constraint it sets; a chunk missing a constrained
//! key never matches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RagError, Result};

pub const VERSION_KEY: &str = "version";
pub const PROTOCOL_TYPE_KEY: &str = "protocol_type";
pub const START_DATE_KEY: &str = "start_date";
pub const END_DATE_KEY: &str = "end_date";

/// Constraints on chunk metadata; unset fields constrain nothing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFilter {
    /// Exact document version, e.g. "4.3.1"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Exact document type, e.g. "Test Protocol"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_type: Option<String>,
    /// Date (`YYYYMMDD`) that must fall inside the document's effective window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_on: Option<i64>,
}

impl MetadataFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn protocol_type(mut self, protocol_type: impl Into<String>) -> Self {
        self.protocol_type = Some(protocol_type.into());
        self
    }

    /// Restrict to documents in force on `date` (YYYY-MM-DD)
    pub fn effective_on(mut self, date: &str) -> Result<Self> {
        self.effective_on = Some(date_key(date)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.version.is_none() && self.protocol_type.is_none() && self.effective_on.is_none()
    }

    /// Whether a chunk with this metadata satisfies every set constraint
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        if let Some(version) = &self.version {
            if metadata.get(VERSION_KEY).and_then(Value::as_str) != Some(version.as_str()) {
                return false;
            }
        }
        if let Some(protocol_type) = &self.protocol_type {
            if metadata.get(PROTOCOL_TYPE_KEY).and_then(Value::as_str)
                != Some(protocol_type.as_str())
            {
                return false;
            }
        }
        if let Some(day) = self.effective_on {
            let start = metadata.get(START_DATE_KEY).and_then(Value::as_i64);
            let end = metadata.get(END_DATE_KEY).and_then(Value::as_i64);
            match (start, end) {
                (Some(start), Some(end)) if start <= day && day <= end => {}
                _ => return false,
            }
        }
        true
    }
}

/// `YYYY-MM-DD` to the `YYYYMMDD` integer stored in chunk metadata
pub fn date_key(date: &str) -> Result<i64> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|e| RagError::Config(format!("Invalid date '{}': {}", date, e)))?;
    parsed
        .format("%Y%m%d")
        .to_string()
        .parse()
        .map_err(|e| RagError::Config(format!("Invalid date '{}': {}", date, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn metadata(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn aeb_v431() -> Map<String, Value> {
        metadata(json!({
            "file_name": "aeb_v431.md",
            "version": "4.3.1",
            "protocol_type": "Test Protocol",
            "start_date": 20230101,
            "end_date": 20251231,
        }))
    }

    #[test]
    fn test_empty_filter_matches_anything() {
        assert!(MetadataFilter::new().is_empty());
        assert!(MetadataFilter::new().matches(&aeb_v431()));
        assert!(MetadataFilter::new().matches(&Map::new()));
    }

    #[test]
    fn test_exact_fields() {
        assert!(MetadataFilter::new().version("4.3.1").matches(&aeb_v431()));
        assert!(!MetadataFilter::new().version("4.3").matches(&aeb_v431()));
        assert!(MetadataFilter::new()
            .protocol_type("Test Protocol")
            .matches(&aeb_v431()));
        assert!(!MetadataFilter::new()
            .protocol_type("Assessment Protocol")
            .matches(&aeb_v431()));
    }

    #[test]
    fn test_effective_window_is_inclusive() {
        let inside = MetadataFilter::new().effective_on("2024-06-30").unwrap();
        let first_day = MetadataFilter::new().effective_on("2023-01-01").unwrap();
        let last_day = MetadataFilter::new().effective_on("2025-12-31").unwrap();
        let after = MetadataFilter::new().effective_on("2026-01-01").unwrap();

        assert!(inside.matches(&aeb_v431()));
        assert!(first_day.matches(&aeb_v431()));
        assert!(last_day.matches(&aeb_v431()));
        assert!(!after.matches(&aeb_v431()));
    }

    #[test]
    fn test_missing_key_never_matches() {
        let filter = MetadataFilter::new().effective_on("2024-01-01").unwrap();
        assert!(!filter.matches(&metadata(json!({"version": "4.3.1"}))));
        assert!(!MetadataFilter::new().version("4.3.1").matches(&Map::new()));
    }

    #[test]
    fn test_date_key() {
        assert_eq!(date_key("2024-02-29").unwrap(), 20240229);
        assert!(matches!(date_key("2023-02-29"), Err(RagError::Config(_))));
        assert!(date_key("next year").is_err());
    }
}
