//! CSV serialization of metric records.

use crate::error::SummaryError;
use crate::normalize::MetricRecord;
use std::borrow::Cow;
use std::path::Path;

pub const CSV_HEADER: &str = "task,sub_task,metric,value,stderr";

/// Written in the `stderr` column when no standard error is available.
pub const NOT_AVAILABLE: &str = "N/A";

/// Stable sort by (task, sub_task, metric).
pub fn sort_records(records: &mut [MetricRecord]) {
    records.sort_by(|a, b| {
        (a.task.as_str(), a.sub_task.as_str(), a.metric.as_str()).cmp(&(
            b.task.as_str(),
            b.sub_task.as_str(),
            b.metric.as_str(),
        ))
    });
}

fn escape(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Render records, in the order given, as CSV with a header row.
pub fn render_csv(records: &[MetricRecord]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + records.len() * 48);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for record in records {
        let stderr = record
            .stderr
            .map(|s| s.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string());
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            escape(&record.task),
            escape(&record.sub_task),
            escape(&record.metric),
            record.value,
            stderr
        ));
    }
    out
}

/// Sort `records` and write them to `path`, replacing any previous file.
///
/// The table is written to a temporary sibling first and renamed into place,
/// so readers never observe a half-written summary.
pub fn write_summary_csv(path: &Path, mut records: Vec<MetricRecord>) -> Result<(), SummaryError> {
    sort_records(&mut records);
    let content = render_csv(&records);

    let tmp = path.with_extension("csv.tmp");
    let write_err = |source| SummaryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let written = std::fs::write(&tmp, content).and_then(|()| std::fs::rename(&tmp, path));
    if let Err(source) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(write_err(source));
    }
    Ok(())
}
