//! External process execution with live output forwarding.

use crate::error::RunnerError;
use crate::invocation::Invocation;
use async_trait::async_trait;
use std::io::{self, Write};
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receives each line the child writes, as soon as it is written.
pub trait LineSink: Send {
    fn line(&mut self, line: &str);
}

/// Forwards lines to this process's stdout, flushing after each one.
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn line(&mut self, line: &str) {
        let mut out = io::stdout().lock();
        // A closed stdout must not abort the run.
        let _ = writeln!(out, "{line}");
        let _ = out.flush();
    }
}

/// Collects lines in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }
}

impl LineSink for MemorySink {
    fn line(&mut self, line: &str) {
        lock(&self.lines).push(line.to_string());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Executes an invocation to completion and reports its exit code.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation) -> Result<i32, RunnerError>;
}

/// Runs external commands one at a time.
///
/// stdout and stderr are read by one task each and merged into a single
/// line stream that is forwarded to the sink in arrival order. The call
/// returns once the child has exited and both streams are drained.
pub struct ProcessRunner {
    sink: Mutex<Box<dyn LineSink>>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(sink: impl LineSink + 'static) -> Self {
        Self {
            sink: Mutex::new(Box::new(sink)),
            timeout: None,
        }
    }

    /// Runner that forwards child output to stdout.
    pub fn stdout() -> Self {
        Self::new(StdoutSink)
    }

    /// Bound each run to `secs` seconds. 0 means no limit.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = (secs > 0).then(|| Duration::from_secs(secs));
        self
    }

    /// Launch the command and block until it exits.
    ///
    /// Returns the exit code, or -1 when the child was terminated by a signal.
    pub async fn run(&self, invocation: &Invocation) -> Result<i32, RunnerError> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(forward_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(forward_lines(stderr, tx.clone())));
        }
        drop(tx);

        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drain(&mut child, rx))
                .await
                .ok(),
            None => Some(self.drain(&mut child, rx).await),
        };

        let status = match finished {
            Some(status) => status?,
            None => {
                warn!(program = %invocation.program, "Timed out, killing child process");
                child.kill().await?;
                for reader in &readers {
                    reader.abort();
                }
                return Err(RunnerError::TimedOut {
                    program: invocation.program.clone(),
                    secs: self.timeout.map(|d| d.as_secs()).unwrap_or_default(),
                });
            }
        };

        for reader in readers {
            match reader.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(error = %e, "Output stream ended with error"),
                Err(e) => debug!(error = %e, "Output reader task failed"),
            }
        }

        Ok(status.code().unwrap_or(-1))
    }

    async fn drain(
        &self,
        child: &mut Child,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) -> io::Result<ExitStatus> {
        while let Some(line) = rx.recv().await {
            lock(&self.sink).line(&line);
        }
        child.wait().await
    }
}

#[async_trait]
impl JobExecutor for ProcessRunner {
    async fn execute(&self, invocation: &Invocation) -> Result<i32, RunnerError> {
        self.run(invocation).await
    }
}

/// Send every `\n`-terminated segment of `reader` as one line.
///
/// Invalid UTF-8 is replaced rather than treated as an error, and a trailing
/// `\r` is dropped.
async fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Some(segment) = segments.next_segment().await? {
        let text = String::from_utf8_lossy(&segment);
        let line = text.strip_suffix('\r').unwrap_or(&text);
        if tx.send(line.to_string()).is_err() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_run_forwards_stdout_lines() {
        let sink = MemorySink::new();
        let runner = ProcessRunner::new(sink.clone());

        let code = runner
            .run(&sh("echo hello; echo world"))
            .await
            .expect("run failed");

        assert_eq!(code, 0);
        assert_eq!(sink.lines(), vec!["hello", "world"]);
    }

    #[tokio::test]
    async fn test_run_merges_stderr() {
        let sink = MemorySink::new();
        let runner = ProcessRunner::new(sink.clone());

        runner
            .run(&sh("echo to-stderr 1>&2"))
            .await
            .expect("run failed");

        assert_eq!(sink.lines(), vec!["to-stderr"]);
    }

    #[tokio::test]
    async fn test_run_reports_nonzero_exit() {
        let runner = ProcessRunner::new(MemorySink::new());
        let code = runner.run(&sh("exit 3")).await.expect("run failed");
        assert_eq!(code, 3);
    }

    #[tokio::test]
    async fn test_run_passes_environment() {
        let sink = MemorySink::new();
        let runner = ProcessRunner::new(sink.clone());

        let mut env = std::collections::BTreeMap::new();
        env.insert("EVALGRID_TEST_VAR".to_string(), "mirror".to_string());
        runner
            .run(&sh("echo $EVALGRID_TEST_VAR").with_env(&env))
            .await
            .expect("run failed");

        assert_eq!(sink.lines(), vec!["mirror"]);
    }

    #[tokio::test]
    async fn test_run_keeps_unterminated_last_line() {
        let sink = MemorySink::new();
        let runner = ProcessRunner::new(sink.clone());

        runner
            .run(&sh("printf 'a\\r\\nno-newline'"))
            .await
            .expect("run failed");

        assert_eq!(sink.lines(), vec!["a", "no-newline"]);
    }

    #[tokio::test]
    async fn test_run_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new(MemorySink::new());
        let err = runner
            .run(&Invocation::new("evalgrid-no-such-binary", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
        assert!(err.to_string().contains("evalgrid-no-such-binary"));
    }

    #[tokio::test]
    async fn test_run_timeout_kills_child() {
        let runner = ProcessRunner::new(MemorySink::new()).with_timeout_secs(1);
        let err = runner.run(&sh("sleep 30")).await.unwrap_err();
        assert!(matches!(err, RunnerError::TimedOut { secs: 1, .. }));
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let runner = ProcessRunner::new(MemorySink::new()).with_timeout_secs(0);
        assert!(runner.timeout.is_none());
    }
}
