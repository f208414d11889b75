//! Source list loading.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{AppError, Result};

/// Accepted layouts of the sources file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SourcesFile {
    Wrapped { sources: Vec<serde_json::Value> },
    Bare(Vec<serde_json::Value>),
}

/// Parse a sources document: `{"sources": [..]}` or a bare array of URLs.
///
/// Non-string entries are stringified, blank entries dropped.
pub fn parse_sources(json: &str) -> Result<Vec<String>> {
    let values = match serde_json::from_str::<SourcesFile>(json)? {
        SourcesFile::Wrapped { sources } => sources,
        SourcesFile::Bare(sources) => sources,
    };

    Ok(values
        .into_iter()
        .map(|v| match v {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        })
        .filter(|s| !s.is_empty())
        .collect())
}

/// Load the configured sources. A missing or malformed file yields no sources.
pub fn load_sources(path: impl AsRef<Path>) -> Vec<String> {
    let path = path.as_ref();
    if !path.exists() {
        return Vec::new();
    }

    match fs::read_to_string(path)
        .map_err(AppError::from)
        .and_then(|content| parse_sources(&content))
    {
        Ok(sources) => sources,
        Err(e) => {
            log::error!("Failed to load sources from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
