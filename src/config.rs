use jsonschema::JSONSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{IngestError, Result};

/// One externally fetchable file for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DataSourceSpec {
    pub url: String,
    pub source_id: String,
    /// Registered strategy name. Empty means "store raw, do not parse".
    pub parsing_strategy: String,
}

/// A tracked ETF and its declared sources, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InstrumentConfig {
    pub name: String,
    pub ticker_symbol: String,
    pub sources: Vec<DataSourceSpec>,
}

/// Load the instrument catalog, validating it against `schema_path` first.
pub fn load_instruments(content_path: &Path, schema_path: &Path) -> Result<Vec<InstrumentConfig>> {
    load_records(content_path, schema_path)
}

/// Load a YAML list of records after validating it against a JSON Schema.
///
/// Missing files, YAML syntax errors, schema violations and shape mismatches
/// all surface as `IngestError::ConfigLoad`. Nothing is returned unless the
/// whole document validates.
pub fn load_records<T: DeserializeOwned>(content_path: &Path, schema_path: &Path) -> Result<Vec<T>> {
    let content_text = fs::read_to_string(content_path).map_err(|e| {
        IngestError::ConfigLoad(format!("Failed to read '{}': {}", content_path.display(), e))
    })?;
    let content: serde_json::Value = serde_yaml::from_str(&content_text).map_err(|e| {
        IngestError::ConfigLoad(format!("Failed to parse YAML in '{}': {}", content_path.display(), e))
    })?;

    let schema_text = fs::read_to_string(schema_path).map_err(|e| {
        IngestError::ConfigLoad(format!("Failed to read schema '{}': {}", schema_path.display(), e))
    })?;
    let schema: serde_json::Value = serde_json::from_str(&schema_text).map_err(|e| {
        IngestError::ConfigLoad(format!("Failed to parse schema '{}': {}", schema_path.display(), e))
    })?;

    validate(&content, &schema)?;

    serde_json::from_value(content).map_err(|e| IngestError::ConfigLoad(e.to_string()))
}

fn validate(content: &serde_json::Value, schema: &serde_json::Value) -> Result<()> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| IngestError::ConfigLoad(format!("schema compile: {}", e)))?;
    if let Err(errors) = compiled.validate(content) {
        let msgs: Vec<String> = errors
            .map(|e| format!("{} at '{}'", e, e.instance_path))
            .collect();
        return Err(IngestError::ConfigLoad(format!(
            "schema validation failed: {}",
            msgs.join("; ")
        )));
    }
    Ok(())
}

/// Keep only the instruments whose ticker is in `tickers`, preserving catalog order.
pub fn filter_by_tickers(
    instruments: Vec<InstrumentConfig>,
    tickers: &HashSet<String>,
) -> Vec<InstrumentConfig> {
    instruments
        .into_iter()
        .filter(|i| tickers.contains(&i.ticker_symbol))
        .collect()
}
