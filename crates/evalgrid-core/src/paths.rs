//! Deterministic result layout.
//!
//! ```text
//! <results_dir>/<model>/results_<task>.json   raw harness output, one per job
//! <results_dir>/<model>/<model>_summary.csv   per-model aggregate
//! ```
//!
//! The harness refuses to overwrite an existing output file, so every job
//! clears its target before the harness is launched.

use crate::job::{ModelId, TaskId};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const RESULT_FILE_PREFIX: &str = "results_";
const RESULT_FILE_SUFFIX: &str = ".json";
const SUMMARY_FILE_SUFFIX: &str = "_summary.csv";

/// Computes and prepares output locations under a results root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    results_root: PathBuf,
}

impl OutputPaths {
    pub fn new(results_root: impl Into<PathBuf>) -> Self {
        Self {
            results_root: results_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.results_root
    }

    pub fn model_dir(&self, model: &ModelId) -> PathBuf {
        self.results_root.join(model.as_str())
    }

    pub fn output_path(&self, model: &ModelId, task: &TaskId) -> PathBuf {
        self.model_dir(model)
            .join(format!("{RESULT_FILE_PREFIX}{task}{RESULT_FILE_SUFFIX}"))
    }

    pub fn summary_path(&self, model: &ModelId) -> PathBuf {
        self.model_dir(model)
            .join(format!("{model}{SUMMARY_FILE_SUFFIX}"))
    }

    /// Create the model's result directory and clear any previous output
    /// for this job. Returns the path the harness should write to.
    pub fn prepare(&self, model: &ModelId, task: &TaskId) -> io::Result<PathBuf> {
        std::fs::create_dir_all(self.model_dir(model))?;
        let path = self.output_path(model, task);
        if clear_existing(&path)? {
            debug!(path = %path.display(), "Removed previous output");
        }
        Ok(path)
    }
}

/// Remove whatever sits at `path`. Returns `true` if something was removed.
///
/// A missing path is not an error. Newer harness versions may leave a
/// directory at the output path, which is removed recursively.
pub fn clear_existing(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            if path.is_dir() {
                std::fs::remove_dir_all(path)?;
                Ok(true)
            } else {
                Err(e)
            }
        }
    }
}

/// Extract the task name from a `results_<task>.json` file name.
pub fn task_from_result_file_name(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(RESULT_FILE_PREFIX)?
        .strip_suffix(RESULT_FILE_SUFFIX)
        .filter(|task| !task.is_empty())
}
