//! Build progress reporting.
//!
//! A rebuild reports `completed / total` pages after every page, starting
//! at 0 and ending at `total`. Progress is observational only: reporters
//! never fail and never block the build, and write errors are ignored.
//! Human and JSON output go to **stderr** so stdout stays parseable.

use std::io::Write;

/// One progress step of a document build.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildProgress {
    /// File name of the document being built.
    pub document: String,
    pub completed: u32,
    pub total: u32,
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: BuildProgress);
}

/// Human-friendly progress on stderr: "index report.pdf  12 / 40 pages".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: BuildProgress) {
        let line = format!(
            "index {}  {} / {} pages\n",
            event.document, event.completed, event.total
        );
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: BuildProgress) {
        let obj = serde_json::json!({
            "event": "progress",
            "document": event.document,
            "completed": event.completed,
            "total": event.total,
        });
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// Progress as `debug` log events; used by the servers.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: BuildProgress) {
        tracing::debug!(
            document = %event.document,
            completed = event.completed,
            total = event.total,
            "index progress"
        );
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: BuildProgress) {}
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
