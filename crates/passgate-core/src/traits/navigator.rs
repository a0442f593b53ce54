//! Navigation side effects.

use std::sync::Mutex;

use tracing::warn;

/// Receives the "send the user to the login page" side effect raised when a
/// session cannot be recovered.
pub trait Navigator: Send + Sync {
    /// Navigate to `location`, abandoning whatever the caller was doing.
    fn navigate(&self, location: &str);
}

/// Navigator that only records the redirect in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, location: &str) {
        warn!(location, "Session ended, navigation requested");
    }
}

/// Navigator that remembers every location it was sent to.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locations navigated to, oldest first.
    pub fn visits(&self) -> Vec<String> {
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Most recent location, if any.
    pub fn last(&self) -> Option<String> {
        self.visits().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) {
        self.visits
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(location.to_string());
    }
}
