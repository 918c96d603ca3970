//! User-facing notifications and page-level fallbacks.
//!
//! The notification surface is optional: without one, messages go to the
//! log and error-level messages additionally raise a blocking alert
//! through the [`PageHost`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

/// Shown when a batch could not be delivered and will be retried.
pub const MSG_CONNECTION_ERROR: &str = "Connection error. Your changes may not be saved.";

/// Shown when the server rejected a batch without an error message.
pub const MSG_UPDATE_FAILED: &str = "Failed to update cart. Please refresh the page.";

/// Shown when automatic retries are exhausted.
pub const MSG_RETRIES_EXHAUSTED: &str =
    "Could not save your cart changes. They will be sent with your next change.";

/// Severity of a user notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    /// Lowercase level name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// Toast/notification surface.
pub trait Notifier: Send + Sync {
    /// Show a non-blocking message.
    fn show(&self, message: &str, level: NoticeLevel);
}

/// Page-level actions the cart falls back to.
pub trait PageHost: Send + Sync {
    /// Reload the whole page.
    fn reload(&self);

    /// Show a blocking alert.
    fn alert(&self, message: &str);
}

/// Routes messages to the notifier, or to the log and page alert.
#[derive(Clone)]
pub struct Notifications {
    notifier: Option<Arc<dyn Notifier>>,
    host: Arc<dyn PageHost>,
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("notifier", &self.notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl Notifications {
    /// Create a router. `notifier` may be absent.
    #[must_use]
    pub fn new(notifier: Option<Arc<dyn Notifier>>, host: Arc<dyn PageHost>) -> Self {
        Self { notifier, host }
    }

    /// Show a message at `level`.
    pub fn show(&self, message: &str, level: NoticeLevel) {
        if let Some(notifier) = &self.notifier {
            notifier.show(message, level);
            return;
        }

        match level {
            NoticeLevel::Info => info!(level = level.as_str(), "{message}"),
            NoticeLevel::Warning => warn!(level = level.as_str(), "{message}"),
            NoticeLevel::Error => {
                error!(level = level.as_str(), "{message}");
                self.host.alert(message);
            }
        }
    }
}

/// Notifier that records every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, NoticeLevel)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages shown so far.
    #[must_use]
    pub fn messages(&self) -> Vec<(String, NoticeLevel)> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages shown at `level`.
    #[must_use]
    pub fn at_level(&self, level: NoticeLevel) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(_, l)| *l == level)
            .map(|(message, _)| message)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str, level: NoticeLevel) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((message.to_string(), level));
    }
}

/// Page host that counts reloads and records alerts.
#[derive(Debug, Default)]
pub struct RecordingHost {
    reloads: AtomicUsize,
    alerts: Mutex<Vec<String>>,
}

impl RecordingHost {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reloads requested.
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Alerts raised so far.
    #[must_use]
    pub fn alerts(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PageHost for RecordingHost {
    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn alert(&self, message: &str) {
        self.alerts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }
}
