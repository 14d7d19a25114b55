//! evalgrid runner
//!
//! Drives the external evaluation harness over a job matrix:
//! - Gates each model on its artifact directory existing
//! - Clears stale output, launches the harness, streams its output live
//! - Records one outcome per job and never stops early

pub mod error;
pub mod evaluation;
pub mod gate;
pub mod invocation;
pub mod report;
pub mod runner;

// Re-export key types
pub use error::{Result, RunnerError};
pub use evaluation::EvaluationLoop;
pub use gate::RunGate;
pub use invocation::Invocation;
pub use report::{write_run_report, JobOutcome, JobRecord, RunReport, RUN_REPORT_FILE};
pub use runner::{JobExecutor, LineSink, MemorySink, ProcessRunner, StdoutSink};
