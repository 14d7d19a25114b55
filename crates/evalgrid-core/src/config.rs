//! Run configuration.
//!
//! An [`EvalConfig`] is built once at process start (defaults, then an
//! optional TOML file, then command-line overrides), validated, and passed
//! by reference to everything that needs it.

use crate::error::{ConfigError, EvalGridError, Result};
use crate::job::{ModelId, TaskId};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// How to invoke the external evaluation harness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    /// Harness executable.
    pub program: String,

    /// Model backend selector (`--model`).
    pub backend: String,

    /// Pass `trust_remote_code=True` in the model-load arguments.
    pub trust_remote_code: bool,

    /// Numeric dtype for model loading.
    pub dtype: String,

    /// Ask the harness to persist per-example samples.
    pub log_samples: bool,

    /// Appended verbatim after the generated arguments.
    pub extra_args: Vec<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            program: "lm_eval".to_string(),
            backend: "hf".to_string(),
            trust_remote_code: true,
            dtype: "bfloat16".to_string(),
            log_samples: true,
            extra_args: Vec::new(),
        }
    }
}

/// Complete configuration for one evaluation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvalConfig {
    /// Root holding one prepared artifact directory per model.
    pub base_model_dir: PathBuf,

    /// Root of the results tree.
    pub results_dir: PathBuf,

    /// Compute device, passed through verbatim.
    pub device: String,

    /// Batch size, passed through verbatim (`8`, `auto`, `auto:4`).
    #[serde(deserialize_with = "string_or_integer")]
    pub batch_size: String,

    /// Per-job timeout in seconds. 0 disables the timeout.
    pub timeout_secs: u64,

    pub models: Vec<ModelId>,
    pub tasks: Vec<TaskId>,

    /// Commands run once before the matrix, e.g. to fetch tokenizer data.
    pub preflight: Vec<Vec<String>>,

    pub tool: ToolConfig,

    /// Extra environment for every child process.
    pub env: BTreeMap<String, String>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert(
            "HF_ENDPOINT".to_string(),
            "https://hf-mirror.com".to_string(),
        );

        Self {
            base_model_dir: PathBuf::from("prepared_models"),
            results_dir: PathBuf::from("eval_results"),
            device: "cuda:0".to_string(),
            batch_size: "8".to_string(),
            timeout_secs: 0,
            models: [
                "Falcon-E-1B-BitNet",
                "Falcon-E-1B-bf16",
                "Falcon-E-3B-BitNet",
                "Falcon-E-3B-bf16",
            ]
            .into_iter()
            .map(ModelId::from)
            .collect(),
            tasks: ["ifeval", "hendrycks_test-math", "gpqa", "musr", "bbh", "mmlu_pro"]
                .into_iter()
                .map(TaskId::from)
                .collect(),
            preflight: vec![["python", "-m", "nltk.downloader", "punkt"]
                .into_iter()
                .map(String::from)
                .collect()],
            tool: ToolConfig::default(),
            env,
        }
    }
}

/// Command-line values that replace configured ones when present.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_model_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub device: Option<String>,
    pub batch_size: Option<String>,
    pub models: Option<Vec<String>>,
    pub tasks: Option<Vec<String>>,
}

impl EvalConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|source| EvalGridError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(dir) = overrides.base_model_dir {
            self.base_model_dir = dir;
        }
        if let Some(dir) = overrides.results_dir {
            self.results_dir = dir;
        }
        if let Some(device) = overrides.device {
            self.device = device;
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(models) = overrides.models {
            self.models = models.into_iter().map(ModelId::new).collect();
        }
        if let Some(tasks) = overrides.tasks {
            self.tasks = tasks.into_iter().map(TaskId::new).collect();
        }
        self
    }

    /// Check everything the job matrix and the harness invocation rely on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        require_non_empty("tool.program", &self.tool.program)?;
        require_non_empty("device", &self.device)?;
        require_non_empty("batch_size", &self.batch_size)?;

        if self.models.is_empty() {
            return Err(ConfigError::EmptyList { field: "models" });
        }
        if self.tasks.is_empty() {
            return Err(ConfigError::EmptyList { field: "tasks" });
        }

        validate_identifiers("model", self.models.iter().map(ModelId::as_str))?;
        validate_identifiers("task", self.tasks.iter().map(TaskId::as_str))?;

        if self.preflight.iter().any(|cmd| cmd.is_empty()) {
            return Err(ConfigError::EmptyField {
                field: "preflight command",
            });
        }

        Ok(())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> std::result::Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyField { field });
    }
    Ok(())
}

/// Identifiers become path components, so they must be plain names.
fn validate_identifiers<'a>(
    kind: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> std::result::Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        let invalid = |reason: &'static str| ConfigError::InvalidIdentifier {
            kind,
            value: id.to_string(),
            reason,
        };

        if id.trim().is_empty() {
            return Err(invalid("must not be empty"));
        }
        if id.trim() != id {
            return Err(invalid("must not have surrounding whitespace"));
        }
        if id.contains('/') || id.contains('\\') {
            return Err(invalid("must not contain path separators"));
        }
        if id == "." || id == ".." {
            return Err(invalid("must not be a relative path component"));
        }
        if !seen.insert(id) {
            return Err(ConfigError::Duplicate {
                kind,
                value: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Accept `batch_size = 8` as well as `batch_size = "auto"`.
fn string_or_integer<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
    })
}

/// Split a comma-separated command-line list, dropping empty entries.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
