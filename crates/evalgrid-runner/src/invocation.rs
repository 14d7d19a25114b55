//! External harness command lines.

use crate::error::RunnerError;
use evalgrid_core::{EvalConfig, Job};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

/// A fully formed external command: program, arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: BTreeMap::new(),
        }
    }

    /// Split `[program, args...]`.
    pub fn from_command(command: &[String]) -> Result<Self, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }

    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Harness invocation for one job.
    ///
    /// ```text
    /// lm_eval --model hf
    ///         --model_args pretrained=<dir>,trust_remote_code=True,dtype=bfloat16
    ///         --tasks <task> --device <device> --batch_size <n>
    ///         --output_path <results_dir>/<model>/results_<task>.json
    ///         --log_samples
    /// ```
    pub fn for_job(job: &Job, config: &EvalConfig) -> Self {
        let tool = &config.tool;

        let mut model_args = format!("pretrained={}", job.model_dir.display());
        if tool.trust_remote_code {
            model_args.push_str(",trust_remote_code=True");
        }
        model_args.push_str(&format!(",dtype={}", tool.dtype));

        let mut args = vec![
            "--model".to_string(),
            tool.backend.clone(),
            "--model_args".to_string(),
            model_args,
            "--tasks".to_string(),
            job.task.to_string(),
            "--device".to_string(),
            config.device.clone(),
            "--batch_size".to_string(),
            config.batch_size.clone(),
            "--output_path".to_string(),
            job.output_path.display().to_string(),
        ];
        if tool.log_samples {
            args.push("--log_samples".to_string());
        }
        args.extend(tool.extra_args.iter().cloned());

        Self::new(tool.program.clone(), args).with_env(&config.env)
    }
}

/// Quote `word` for a POSIX shell unless every character is inert there.
fn shell_quote(word: &str) -> Cow<'_, str> {
    let inert = |c: char| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c);
    if !word.is_empty() && word.chars().all(inert) {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(format!("'{}'", word.replace('\'', "'\\''")))
    }
}

/// Renders as a command line that a POSIX shell would run unchanged.
impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", shell_quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", shell_quote(arg))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evalgrid_core::JobMatrix;

    fn first_job(config: &EvalConfig) -> Job {
        JobMatrix::from_config(config)
            .jobs()
            .next()
            .expect("matrix has jobs")
    }

    #[test]
    fn test_job_invocation_matches_harness_contract() {
        let mut config = EvalConfig::default();
        config.base_model_dir = "/models".into();
        config.results_dir = "/results".into();
        let job = first_job(&config);

        let inv = Invocation::for_job(&job, &config);
        assert_eq!(inv.program, "lm_eval");
        assert_eq!(
            inv.args,
            vec![
                "--model",
                "hf",
                "--model_args",
                "pretrained=/models/Falcon-E-1B-BitNet,trust_remote_code=True,dtype=bfloat16",
                "--tasks",
                "ifeval",
                "--device",
                "cuda:0",
                "--batch_size",
                "8",
                "--output_path",
                "/results/Falcon-E-1B-BitNet/results_ifeval.json",
                "--log_samples",
            ]
        );
        assert_eq!(inv.env["HF_ENDPOINT"], "https://hf-mirror.com");
    }

    #[test]
    fn test_tool_options_shape_arguments() {
        let mut config = EvalConfig::default();
        config.tool.trust_remote_code = false;
        config.tool.log_samples = false;
        config.tool.dtype = "float16".to_string();
        config.tool.extra_args = vec!["--limit".to_string(), "5".to_string()];
        let job = first_job(&config);

        let inv = Invocation::for_job(&job, &config);
        let model_args = &inv.args[3];
        assert!(!model_args.contains("trust_remote_code"));
        assert!(model_args.ends_with(",dtype=float16"));
        assert!(!inv.args.contains(&"--log_samples".to_string()));
        assert_eq!(&inv.args[inv.args.len() - 2..], ["--limit", "5"]);
    }

    #[test]
    fn test_from_command() {
        let inv = Invocation::from_command(&[
            "python".to_string(),
            "-m".to_string(),
            "nltk.downloader".to_string(),
        ])
        .expect("non-empty");
        assert_eq!(inv.program, "python");
        assert_eq!(inv.args, vec!["-m", "nltk.downloader"]);

        assert!(matches!(
            Invocation::from_command(&[]),
            Err(RunnerError::EmptyCommand)
        ));
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let inv = Invocation::new(
            "lm_eval",
            vec!["--tasks".to_string(), "a b".to_string(), "".to_string()],
        );
        assert_eq!(inv.to_string(), "lm_eval --tasks 'a b' ''");
    }

    #[test]
    fn test_display_quotes_shell_metacharacters() {
        let inv = Invocation::new(
            "lm_eval",
            vec![
                "--gen_kwargs".to_string(),
                "stop=$END;".to_string(),
                "it's".to_string(),
                "pretrained=/m/x,dtype=bfloat16".to_string(),
            ],
        );
        assert_eq!(
            inv.to_string(),
            "lm_eval --gen_kwargs 'stop=$END;' 'it'\\''s' pretrained=/m/x,dtype=bfloat16"
        );
    }
}
