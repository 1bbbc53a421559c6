use chrono::{DateTime, Utc};
use peerlink_core::{BridgeError, ErrorKind};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::error;

const MAX_SURFACED: usize = 256;

/// An error that was shown to the host user instead of being propagated.
#[derive(Debug, Clone)]
pub struct SurfacedError {
    pub kind: ErrorKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// The host's human-observable error channel.
///
/// Every surfaced error is logged at error level and kept in a bounded,
/// shared history the embedding application can display.
#[derive(Debug, Clone, Default)]
pub struct ErrorReporter {
    history: Arc<Mutex<VecDeque<SurfacedError>>>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn surface(&self, err: &BridgeError) {
        let kind = err.kind();
        error!(kind = ?kind, "{}", err);

        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        if history.len() == MAX_SURFACED {
            history.pop_front();
        }
        history.push_back(SurfacedError {
            kind,
            message: err.to_string(),
            at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> Vec<SurfacedError> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().cloned().collect()
    }

    /// Removes and returns everything surfaced so far.
    pub fn drain(&self) -> Vec<SurfacedError> {
        let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}
