//! Results-tree walk: one summary per model directory.
//!
//! Every stage degrades to skip-and-continue. An unreadable or malformed
//! result file contributes nothing, a model with no usable records is left
//! without a summary, and neither affects any other file or model.

use crate::document::RawResultDocument;
use crate::error::SummaryError;
use crate::normalize::{normalize_document, MetricRecord};
use crate::writer::write_summary_csv;
use evalgrid_core::{clear_existing, task_from_result_file_name, ModelId, OutputPaths};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What one result file contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Parsed { records: usize },
    NoResults,
    Malformed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub task: String,
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// What happened to one model's summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModelSummaryOutcome {
    Written { path: PathBuf, records: usize },

    /// No usable records. No file was written and any earlier summary
    /// was removed.
    Empty,

    /// The directory could not be listed or the table could not be written.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelReport {
    pub model: String,
    pub files: Vec<FileReport>,
    pub outcome: ModelSummaryOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub models: Vec<ModelReport>,
}

impl SummaryReport {
    pub fn written_count(&self) -> usize {
        self.models
            .iter()
            .filter(|m| matches!(m.outcome, ModelSummaryOutcome::Written { .. }))
            .count()
    }

    pub fn model(&self, name: &str) -> Option<&ModelReport> {
        self.models.iter().find(|m| m.model == name)
    }
}

/// Summarize every model directory under `results_root`, in name order.
///
/// Fails only if `results_root` itself cannot be listed.
pub fn summarize_results(results_root: &Path) -> Result<SummaryReport, SummaryError> {
    let read_err = |source| SummaryError::Read {
        path: results_root.to_path_buf(),
        source,
    };

    let mut model_dirs = Vec::new();
    for entry in std::fs::read_dir(results_root).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => model_dirs.push(name),
            Err(name) => warn!(name = ?name, "Skipping non UTF-8 model directory"),
        }
    }
    model_dirs.sort();

    let paths = OutputPaths::new(results_root);
    let models = model_dirs
        .iter()
        .map(|name| summarize_model(&paths, &ModelId::new(name.as_str())))
        .collect();

    Ok(SummaryReport { models })
}

/// Read every `results_<task>.json` of one model and write its summary.
pub fn summarize_model(paths: &OutputPaths, model: &ModelId) -> ModelReport {
    let model_dir = paths.model_dir(model);

    let files = match result_files(&model_dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(model = %model, error = %e, "Cannot list model results, skipping");
            return ModelReport {
                model: model.to_string(),
                files: Vec::new(),
                outcome: ModelSummaryOutcome::Failed {
                    error: e.to_string(),
                },
            };
        }
    };

    let mut records: Vec<MetricRecord> = Vec::new();
    let mut reports = Vec::with_capacity(files.len());

    for (task, path) in files {
        let outcome = match RawResultDocument::read(&path) {
            Err(e) => {
                warn!(model = %model, task = %task, error = %e, "Skipping unreadable result file");
                FileOutcome::Malformed {
                    error: e.to_string(),
                }
            }
            Ok(doc) if doc.is_empty() => {
                info!(model = %model, task = %task, "No results to summarize");
                FileOutcome::NoResults
            }
            Ok(doc) => {
                let found = normalize_document(&task, &doc);
                debug!(model = %model, task = %task, records = found.len(), "Normalized result file");
                let count = found.len();
                records.extend(found);
                FileOutcome::Parsed { records: count }
            }
        };
        reports.push(FileReport {
            task,
            path,
            outcome,
        });
    }

    let summary_path = paths.summary_path(model);
    let outcome = if records.is_empty() {
        warn!(model = %model, "No records produced, summary not written");
        match clear_existing(&summary_path) {
            Ok(true) => {
                info!(model = %model, path = %summary_path.display(), "Removed stale summary");
                ModelSummaryOutcome::Empty
            }
            Ok(false) => ModelSummaryOutcome::Empty,
            Err(e) => {
                warn!(model = %model, error = %e, "Failed to remove stale summary");
                ModelSummaryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    } else {
        let count = records.len();
        match write_summary_csv(&summary_path, records) {
            Ok(()) => {
                info!(
                    model = %model,
                    records = count,
                    path = %summary_path.display(),
                    "Summary written"
                );
                ModelSummaryOutcome::Written {
                    path: summary_path,
                    records: count,
                }
            }
            Err(e) => {
                warn!(model = %model, error = %e, "Failed to write summary");
                ModelSummaryOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    };

    ModelReport {
        model: model.to_string(),
        files: reports,
        outcome,
    }
}

/// `(task, path)` for each result file in `model_dir`, sorted by file name.
fn result_files(model_dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(model_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(task) = task_from_result_file_name(name) {
            files.push((task.to_string(), path.clone()));
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_result_files_filters_and_sorts() {
        let dir = tempdir().unwrap();
        for name in [
            "results_b.json",
            "results_a.json",
            "m_summary.csv",
            "notes.txt",
            "results_.json",
        ] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("results_dir.json")).unwrap();

        let tasks: Vec<String> = result_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|(task, _)| task)
            .collect();
        assert_eq!(tasks, vec!["a", "b"]);
    }

    #[test]
    fn test_summarize_results_missing_root_is_error() {
        let dir = tempdir().unwrap();
        let err = summarize_results(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SummaryError::Read { .. }));
    }

    #[test]
    fn test_files_at_root_are_not_models() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("run_report.json"), "{}").unwrap();
        let report = summarize_results(dir.path()).unwrap();
        assert!(report.models.is_empty());
    }
}
