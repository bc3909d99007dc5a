//! Ingestion progress reporting.
//!
//! The CLI forwards every [`IngestStatus`] pulled from an ingestion run to a
//! [`ProgressReporter`]. Progress is emitted on **stderr** so stdout remains
//! parseable for scripts.

use std::io::Write;

use crate::ingest::IngestStatus;

/// Reports ingestion progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, status: &IngestStatus);
}

/// Human-friendly progress on stderr: "ingest  Loading data (unit 1/2)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, status: &IngestStatus) {
        let line = match status {
            IngestStatus::Complete { units, chunks } => format!(
                "ingest  complete  {} chunks from {} unit(s)\n",
                format_number(*chunks as u64),
                units
            ),
            other => format!("ingest  {}\n", other),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, status: &IngestStatus) {
        let obj = serde_json::json!({
            "event": "progress",
            "label": status.to_string(),
            "status": status,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _status: &IngestStatus) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
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

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
