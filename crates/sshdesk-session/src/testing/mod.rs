//! Testing utilities for the session lifecycle.
//!
//! Provides a transport whose opens are answered by the test, a directory with
//! a controllable refresh, and a notifier that records what it was told.

pub mod directory;
pub mod transport;

pub use directory::ScriptedDirectory;
pub use transport::{PendingOpen, ScriptedTransport};

use parking_lot::Mutex;

use crate::notice::{Notice, Notifier};

/// Notifier that keeps every notice in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    /// Number of notices received.
    pub fn count(&self) -> usize {
        self.notices.lock().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
