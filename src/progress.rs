//! Ingestion progress reporting.
//!
//! Reports observable progress during `lens add` so users see which file is
//! being processed, how many are left, and how each one ended. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

use crate::models::IngestOutcome;

/// A single progress event for batch ingestion.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// A document entered the pipeline.
    Started { filename: String },
    /// A document reached a terminal state; `n` of `total` are done.
    Finished {
        outcome: IngestOutcome,
        n: u64,
        total: u64,
    },
}

/// Reports ingestion progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "add  3 / 12  report.pdf  indexed (14 chunks)".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Started { filename } => format!("add  {}  processing...\n", filename),
            IngestProgressEvent::Finished { outcome, n, total } => {
                let status = match outcome.error() {
                    Some(reason) => format!("failed: {}", reason),
                    None if outcome.failed_chunks.is_empty() => {
                        format!("indexed ({} chunks)", format_number(outcome.chunks as u64))
                    }
                    None => format!(
                        "indexed ({} chunks, {} failed)",
                        format_number(outcome.chunks as u64),
                        outcome.failed_chunks.len()
                    ),
                };
                format!(
                    "add  {} / {}  {}  {}\n",
                    format_number(*n),
                    format_number(*total),
                    outcome.filename,
                    status
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Started { filename } => serde_json::json!({
                "event": "started",
                "filename": filename,
            }),
            IngestProgressEvent::Finished { outcome, n, total } => serde_json::json!({
                "event": "finished",
                "n": n,
                "total": total,
                "outcome": outcome,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
