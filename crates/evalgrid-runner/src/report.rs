//! Job outcomes and the per-run report.

use crate::error::RunnerError;
use chrono::{DateTime, Utc};
use evalgrid_core::{ModelId, TaskId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// File name of the report inside the results root.
pub const RUN_REPORT_FILE: &str = "run_report.json";

/// What happened to one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The model's artifact directory was missing.
    Skipped,

    /// The harness exited with code 0.
    Succeeded,

    /// The harness exited non-zero, or could not be run at all (-1).
    Failed { exit_code: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub model: ModelId,
    pub task: TaskId,
    pub outcome: JobOutcome,
    pub duration_ms: u64,
    pub output_path: PathBuf,
}

/// Result of one pass over the job matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,

    /// Digest of the ordered model and task lists.
    pub matrix_digest: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub results_dir: PathBuf,

    /// Preflight commands that failed or could not be launched.
    #[serde(default)]
    pub preflight_failures: usize,

    /// One record per job, in matrix order.
    pub jobs: Vec<JobRecord>,
}

impl RunReport {
    pub fn succeeded_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Succeeded))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Skipped))
    }

    /// No job failed. Skipped jobs do not count as failures.
    pub fn all_succeeded(&self) -> bool {
        self.failed_count() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &JobRecord> {
        self.jobs
            .iter()
            .filter(|j| matches!(j.outcome, JobOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.jobs.iter().filter(|j| pred(&j.outcome)).count()
    }
}

/// Write the report as pretty JSON, replacing any previous report.
pub fn write_run_report(path: &Path, report: &RunReport) -> Result<(), RunnerError> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)?;
    Ok(())
}
