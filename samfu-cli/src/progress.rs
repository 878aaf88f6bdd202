//! A terminal [`ProgressSink`] rendering status lines and colored messages.

use std::{
    io::Write,
    sync::Mutex,
};

use owo_colors::OwoColorize;
use samfu_core::orchestrator::{ProgressSink, Severity};

/// Renders progress to stdout, one line per event. Holds no throttling
/// logic of its own besides collapsing repeated lines for the same stage,
/// matching the "throttling belongs in the sink" split documented on the
/// engines.
pub struct TerminalSink {
    last_stage: Mutex<Option<String>>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self { last_stage: Mutex::new(None) }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalSink {
    fn status(&self, message: &str) {
        let mut stdout = anstream::stdout();
        let _ = writeln!(stdout, "{}", message.bright_black());
    }

    fn progress(&self, stage: &str, done: u64, total: u64, label: &str) {
        let mut stdout = anstream::stdout();
        let pct = if total > 0 { (done as f64 / total as f64) * 100.0 } else { 0.0 };

        let mut last_stage = self.last_stage.lock().unwrap();
        if last_stage.as_deref() != Some(stage) {
            let _ = writeln!(stdout, "{}", stage.to_uppercase().bold());
            *last_stage = Some(stage.to_string());
        }

        let _ = writeln!(stdout, "  {:>6.2}% {} ({done}/{total})", pct, label.bright_black());
    }

    fn message(&self, text: &str, severity: Severity) {
        let mut stdout = anstream::stdout();
        let rendered = match severity {
            Severity::Info => text.cyan().to_string(),
            Severity::Success => text.green().to_string(),
            Severity::Warning => text.yellow().to_string(),
            Severity::Error => text.red().to_string(),
        };
        let _ = writeln!(stdout, "{rendered}");
    }
}
