//! Process-wide context the worker thread carries explicitly instead of
//! reaching for module-level globals.

use std::{
    fmt,
    process,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use super::progress::{NoopSink, ProgressSink};
use crate::config::Config;

/// An identifier created once at startup, used to deduplicate audit rows
/// per device within a single run. Never persisted across runs.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new session id from the current time and process id;
    /// unique enough to scope one run, never meant to be stable across
    /// runs or compared between machines.
    pub fn generate() -> Self {
        let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
        Self(format!("{:x}-{:x}", process::id(), nanos))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cooperative cancellation flag threaded through the download, decrypt,
/// and extract engines. Cheaply cloneable; every clone shares the same
/// underlying flag.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything the orchestrator's worker thread needs, gathered into one
/// value created at startup and passed down explicitly.
pub struct AppContext {
    pub session_id: SessionId,
    pub config: Config,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancelToken,
}

impl AppContext {
    pub fn new(config: Config) -> Self {
        Self { session_id: SessionId::generate(), config, progress: Arc::new(NoopSink), cancel: CancelToken::new() }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_distinct_across_calls() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn cancel_token_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
