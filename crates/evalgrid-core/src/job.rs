//! Job identifiers and the ordered job matrix.

use crate::config::EvalConfig;
use crate::paths::OutputPaths;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;

/// Name of a checkpoint variant (e.g. a size/quantization combination).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Name of a benchmark task understood by the evaluation harness.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One (model, task) evaluation unit with its derived paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub model: ModelId,
    pub task: TaskId,

    /// Directory holding the prepared model artifacts.
    pub model_dir: PathBuf,

    /// Where the harness writes its result JSON.
    pub output_path: PathBuf,
}

/// Ordered set of jobs for one run: model-major, task-minor.
#[derive(Debug, Clone)]
pub struct JobMatrix {
    models: Vec<ModelId>,
    tasks: Vec<TaskId>,
    model_root: PathBuf,
    paths: OutputPaths,
}

impl JobMatrix {
    pub fn new(
        models: Vec<ModelId>,
        tasks: Vec<TaskId>,
        model_root: impl Into<PathBuf>,
        paths: OutputPaths,
    ) -> Self {
        Self {
            models,
            tasks,
            model_root: model_root.into(),
            paths,
        }
    }

    pub fn from_config(config: &EvalConfig) -> Self {
        Self::new(
            config.models.clone(),
            config.tasks.clone(),
            config.base_model_dir.clone(),
            OutputPaths::new(config.results_dir.clone()),
        )
    }

    pub fn models(&self) -> &[ModelId] {
        &self.models
    }

    pub fn tasks(&self) -> &[TaskId] {
        &self.tasks
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Artifact directory for a model under the model root.
    pub fn model_dir(&self, model: &ModelId) -> PathBuf {
        self.model_root.join(model.as_str())
    }

    pub fn len(&self) -> usize {
        self.models.len() * self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazily yield every job: all tasks for `models[0]`, then `models[1]`, ...
    pub fn jobs(&self) -> impl Iterator<Item = Job> + '_ {
        self.models.iter().flat_map(move |model| {
            let model_dir = self.model_dir(model);
            self.tasks.iter().map(move |task| Job {
                model: model.clone(),
                task: task.clone(),
                model_dir: model_dir.clone(),
                output_path: self.paths.output_path(model, task),
            })
        })
    }

    /// SHA-256 over the ordered model and task lists.
    ///
    /// Two runs with the same digest attempted the same matrix in the same order.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(b"models\0");
        for model in &self.models {
            hasher.update(model.as_str().as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(b"tasks\0");
        for task in &self.tasks {
            hasher.update(task.as_str().as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}
