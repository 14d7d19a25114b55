//! Flattening of nested result documents into metric records.

use crate::document::RawResultDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Suffix marking a standard-error companion of a metric.
pub const STDERR_SUFFIX: &str = "_stderr";

/// One metric value for one subtask of one task.
///
/// `metric` never ends in [`STDERR_SUFFIX`]; standard errors are folded into
/// `stderr` of their base metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub task: String,
    pub sub_task: String,
    pub metric: String,
    pub value: f64,
    pub stderr: Option<f64>,
}

/// If `key` names a standard error, return the key of its base metric.
///
/// Handles both `acc_stderr` and the filtered form `acc_stderr,none`, whose
/// base is `acc,none`.
pub fn stderr_base(key: &str) -> Option<String> {
    match key.split_once(',') {
        Some((name, filter)) => name
            .strip_suffix(STDERR_SUFFIX)
            .map(|base| format!("{base},{filter}")),
        None => key.strip_suffix(STDERR_SUFFIX).map(str::to_string),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Produce one record per numeric, non-stderr metric of every subtask.
///
/// Non-numeric values (aliases, free text) are left out. A standard error
/// whose base metric is absent is dropped, and a non-numeric standard error
/// (the harness writes `"N/A"`) counts as not available.
pub fn normalize_document(task: &str, document: &RawResultDocument) -> Vec<MetricRecord> {
    let mut records = Vec::new();

    for (sub_task, metrics) in document.subtasks() {
        let stderrs: HashMap<String, Option<f64>> = metrics
            .iter()
            .filter_map(|(key, value)| stderr_base(key).map(|base| (base, as_number(value))))
            .collect();

        for (key, value) in metrics {
            if stderr_base(key).is_some() {
                continue;
            }
            let Some(value) = as_number(value) else {
                continue;
            };

            records.push(MetricRecord {
                task: task.to_string(),
                sub_task: sub_task.to_string(),
                metric: key.clone(),
                value,
                stderr: stderrs.get(key).copied().flatten(),
            });
        }
    }

    records
}
