//! evalgrid core
//!
//! Shared building blocks for the evaluation orchestrator:
//! - [`EvalConfig`]: the validated run configuration
//! - [`JobMatrix`]: the ordered (model, task) work list
//! - [`OutputPaths`]: deterministic result layout with clear-before-write
//! - [`telemetry`]: tracing initialisation for the binaries

pub mod config;
pub mod error;
pub mod job;
pub mod paths;
pub mod telemetry;

pub use config::{split_list, ConfigOverrides, EvalConfig, ToolConfig};
pub use error::{ConfigError, EvalGridError, Result};
pub use job::{Job, JobMatrix, ModelId, TaskId};
pub use paths::{clear_existing, task_from_result_file_name, OutputPaths};
