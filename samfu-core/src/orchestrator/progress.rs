//! The capability set the orchestrator reports progress through.
//!
//! Every engine and the orchestrator itself talk to a `&dyn ProgressSink`
//! rather than a concrete UI type, so the same pipeline code drives a
//! terminal renderer, a GUI, or (in tests) a recording sink.

use std::sync::Mutex;

/// How a [`ProgressSink::message`] call should be presented to a user.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Progress and status reporting, invoked from the worker thread only.
pub trait ProgressSink: Send + Sync {
    /// A short, transient status line (e.g. "Waiting for device...").
    fn status(&self, _message: &str) {}

    /// Incremental progress within a named stage (`"download"`,
    /// `"decrypt"`, `"extract"`, `"checksum"`).
    fn progress(&self, _stage: &str, _done: u64, _total: u64, _label: &str) {}

    /// A terminal or noteworthy message with a presentation hint.
    fn message(&self, _text: &str, _severity: Severity) {}
}

/// A [`ProgressSink`] that discards everything, for callers that don't need
/// progress reporting.
pub struct NoopSink;
impl ProgressSink for NoopSink {}

/// A [`ProgressSink`] that records every call for assertions in tests.
#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<(String, Severity)>>,
    statuses: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn message(&self, text: &str, severity: Severity) {
        self.messages.lock().unwrap().push((text.to_string(), severity));
    }
}
