//! Tolerant schema for harness result files.

use crate::error::SummaryError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// The part of a result file the summary needs.
///
/// Unknown top-level keys (`configs`, `versions`, `n-shot`, ...) are ignored
/// and a missing or null `results` key reads as empty. Subtask values are
/// kept as raw JSON because metric shapes vary by task.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawResultDocument {
    #[serde(default)]
    results: Option<BTreeMap<String, Value>>,
}

impl RawResultDocument {
    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn read(path: &Path) -> Result<Self, SummaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| SummaryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| SummaryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// True when there is no subtask with a metric mapping.
    pub fn is_empty(&self) -> bool {
        self.subtasks().next().is_none()
    }

    /// Subtasks in name order. Entries whose value is not an object are skipped.
    pub fn subtasks(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.results
            .iter()
            .flatten()
            .filter_map(|(name, value)| value.as_object().map(|m| (name.as_str(), m)))
    }
}
