//! The evaluation loop.
//!
//! Per job: `pending -> skipped` when the model gate is closed, otherwise
//! `pending -> running -> {succeeded, failed}`. Every outcome advances to the
//! next job in matrix order; there are no retries and nothing aborts the
//! matrix early.

use crate::error::RunnerError;
use crate::gate::RunGate;
use crate::invocation::Invocation;
use crate::report::{JobOutcome, JobRecord, RunReport};
use crate::runner::JobExecutor;
use chrono::Utc;
use evalgrid_core::{EvalConfig, Job, JobMatrix, ModelId};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Sequential orchestrator over a job matrix.
pub struct EvaluationLoop {
    config: EvalConfig,
    matrix: JobMatrix,
    executor: Arc<dyn JobExecutor>,
}

impl EvaluationLoop {
    pub fn new(config: EvalConfig, executor: Arc<dyn JobExecutor>) -> Self {
        let matrix = JobMatrix::from_config(&config);
        Self {
            config,
            matrix,
            executor,
        }
    }

    pub fn matrix(&self) -> &JobMatrix {
        &self.matrix
    }

    /// Run every job once and return the report.
    ///
    /// Only an uncreatable results root is an error; job failures and
    /// missing models are recorded in the report instead.
    pub async fn run(&self) -> Result<RunReport, RunnerError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let run_id = Uuid::new_v4();

        info!(
            run_id = %run_id,
            jobs = self.matrix.len(),
            "Starting evaluation process"
        );
        std::fs::create_dir_all(self.matrix.paths().root())?;

        let preflight_failures = self.run_preflight().await;

        let mut gate = ModelGateCache::default();
        let mut jobs = Vec::with_capacity(self.matrix.len());

        for job in self.matrix.jobs() {
            if !gate.is_runnable(&job) {
                jobs.push(JobRecord {
                    model: job.model,
                    task: job.task,
                    outcome: JobOutcome::Skipped,
                    duration_ms: 0,
                    output_path: job.output_path,
                });
                continue;
            }

            let job_start = Instant::now();
            let outcome = self.run_job(&job).await;
            jobs.push(JobRecord {
                model: job.model,
                task: job.task,
                outcome,
                duration_ms: job_start.elapsed().as_millis() as u64,
                output_path: job.output_path,
            });
        }

        let report = RunReport {
            run_id,
            matrix_digest: self.matrix.digest(),
            started_at,
            finished_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            results_dir: self.matrix.paths().root().to_path_buf(),
            preflight_failures,
            jobs,
        };

        info!(
            run_id = %run_id,
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            skipped = report.skipped_count(),
            results_dir = %report.results_dir.display(),
            "All evaluations complete"
        );
        Ok(report)
    }

    /// Run the configured preflight commands. Returns how many failed.
    pub async fn run_preflight(&self) -> usize {
        let mut failures = 0;
        for command in &self.config.preflight {
            let invocation = match Invocation::from_command(command) {
                Ok(inv) => inv.with_env(&self.config.env),
                Err(e) => {
                    warn!(error = %e, "Skipping invalid preflight command");
                    failures += 1;
                    continue;
                }
            };

            info!("Preflight: {invocation}");
            match self.executor.execute(&invocation).await {
                Ok(0) => {}
                Ok(code) => {
                    warn!(command = %invocation, exit_code = code, "Preflight command failed");
                    failures += 1;
                }
                Err(e) => {
                    warn!(command = %invocation, error = %e, "Preflight command could not be run");
                    failures += 1;
                }
            }
        }
        failures
    }

    async fn run_job(&self, job: &Job) -> JobOutcome {
        info!(model = %job.model, task = %job.task, "Running evaluation");

        if let Err(e) = self.matrix.paths().prepare(&job.model, &job.task) {
            error!(
                model = %job.model,
                task = %job.task,
                path = %job.output_path.display(),
                error = %e,
                "Failed to prepare output path"
            );
            return JobOutcome::Failed { exit_code: -1 };
        }

        let invocation = Invocation::for_job(job, &self.config);
        info!("Executing command: {invocation}");

        match self.executor.execute(&invocation).await {
            Ok(0) => {
                info!(model = %job.model, task = %job.task, "Successfully completed task");
                JobOutcome::Succeeded
            }
            Ok(code) => {
                error!(
                    model = %job.model,
                    task = %job.task,
                    exit_code = code,
                    "Error running evaluation"
                );
                JobOutcome::Failed { exit_code: code }
            }
            Err(e) => {
                error!(
                    model = %job.model,
                    task = %job.task,
                    error = %e,
                    "Evaluation could not be run"
                );
                JobOutcome::Failed { exit_code: -1 }
            }
        }
    }
}

/// Evaluates the gate once per model. The matrix is model-major, so a
/// change of model is the only point a new check is needed.
#[derive(Default)]
struct ModelGateCache {
    current: Option<ModelId>,
    runnable: bool,
}

impl ModelGateCache {
    fn is_runnable(&mut self, job: &Job) -> bool {
        if self.current.as_ref() != Some(&job.model) {
            self.runnable = RunGate::is_runnable(&job.model_dir);
            if !self.runnable {
                warn!(
                    model = %job.model,
                    path = %job.model_dir.display(),
                    "Model directory not found, skipping all tasks for this model"
                );
            }
            self.current = Some(job.model.clone());
        }
        self.runnable
    }
}
