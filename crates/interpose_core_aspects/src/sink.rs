//! Diagnostic sinks.
//!
//! A [`DiagnosticSink`] receives the lines written by [`LogAspect`](crate::LogAspect).
//! Each line carries a [`Severity`]; what a sink does with it is up to the sink:
//!
//! | Sink | Output |
//! |------|--------|
//! | [`TracingSink`] | `tracing` event at the matching level, target `interpose::diagnostics` |
//! | [`WriterSink`] | `[DEBUG] ...` / `[ERROR] ...` lines on any `io::Write` |
//! | [`MemorySink`] | captured in memory, for tests |

use core::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use interpose_aspect::AdviceError;
use parking_lot::Mutex;
use thiserror::Error;

/// Severity of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Method entry and exit.
    Debug,
    /// Fault reports.
    Error,
}

impl Severity {
    /// Returns the line prefix used by [`WriterSink`].
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Debug => "[DEBUG]",
            Self::Error => "[ERROR]",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Errors writing a diagnostic line.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying writer failed.
    #[error("failed to write diagnostic line: {0}")]
    Io(#[from] io::Error),

    /// The sink no longer accepts lines.
    #[error("diagnostic sink is closed")]
    Closed,
}

impl From<SinkError> for AdviceError {
    fn from(error: SinkError) -> Self {
        AdviceError::sink(error.to_string())
    }
}

/// Destination for diagnostic lines.
///
/// Sinks are shared by every call through an aspect and must serialize their
/// own writes.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Writes one line.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the line could not be written.
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError>;
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for Arc<S> {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        (**self).write(severity, line)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingSink
// ─────────────────────────────────────────────────────────────────────────────

/// Forwards lines to `tracing` with target `interpose::diagnostics`.
///
/// Never fails; whether the event is recorded depends on the installed
/// subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        match severity {
            Severity::Debug => tracing::debug!(target: "interpose::diagnostics", "{line}"),
            Severity::Error => tracing::error!(target: "interpose::diagnostics", "{line}"),
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WriterSink
// ─────────────────────────────────────────────────────────────────────────────

/// Writes `<prefix> <line>` to an [`io::Write`], flushing after every line.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: Write + Send + 'static> WriterSink<W> {
    /// Wraps a writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Consumes the sink, returning the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl WriterSink<io::Stdout> {
    /// Writes to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W> fmt::Debug for WriterSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterSink").finish_non_exhaustive()
    }
}

impl<W: Write + Send + 'static> DiagnosticSink for WriterSink<W> {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        let mut writer = self.writer.lock();
        writeln!(writer, "{} {line}", severity.prefix())?;
        writer.flush()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemorySink
// ─────────────────────────────────────────────────────────────────────────────

/// Captures lines in memory.
///
/// Intended for tests: share it through an `Arc` and inspect
/// [`entries`](Self::entries) after the calls under test.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Severity, String)>>,
    closed: AtomicBool,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the captured lines with their severity, in write order.
    #[must_use]
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries.lock().clone()
    }

    /// Returns the captured lines, in write order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Returns the captured lines of one severity.
    #[must_use]
    pub fn lines_with(&self, severity: Severity) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|(captured, _)| *captured == severity)
            .map(|(_, line)| line.clone())
            .collect()
    }

    /// Discards the captured lines.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Makes every later write fail with [`SinkError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl DiagnosticSink for MemorySink {
    fn write(&self, severity: Severity, line: &str) -> Result<(), SinkError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SinkError::Closed);
        }
        self.entries.lock().push((severity, line.to_string()));
        Ok(())
    }
}
