//! Transient notification center
//!
//! UI notices with a severity level and an auto-dismiss timer. Purely
//! cosmetic: nothing in the synchronization path depends on this module.

use crate::observer::{Observers, StateChange, StoreObserver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long a notice stays up by default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Notice severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// Neutral information
    Info,
    /// Operation succeeded
    Success,
    /// Something degraded but recoverable
    Warning,
    /// Operation failed
    Error,
}

impl NotificationLevel {
    /// Get a short label for this level
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A transient notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Notice identifier, unique within the center
    pub id: u64,
    /// Severity
    pub level: NotificationLevel,
    /// Display text
    pub message: String,
}

struct CenterShared {
    entries: Mutex<Vec<Notification>>,
    timers: Mutex<HashMap<u64, JoinHandle<()>>>,
    observers: Observers,
}

impl CenterShared {
    fn remove(&self, id: u64) -> bool {
        if let Some(timer) = self.timers.lock().remove(&id) {
            timer.abort();
        }
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|n| n.id != id);
        let removed = entries.len() != before;
        drop(entries);
        if removed {
            self.observers.notify(StateChange::Notifications);
        }
        removed
    }
}

/// Transient notices with auto-dismiss.
///
/// Requires a tokio runtime context when a notice is pushed with a
/// nonzero timeout.
pub struct NotificationCenter {
    shared: Arc<CenterShared>,
    next_id: AtomicU64,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationCenter {
    /// Empty center.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(CenterShared {
                entries: Mutex::new(Vec::new()),
                timers: Mutex::new(HashMap::new()),
                observers: Observers::new(),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer for notification changes.
    pub fn register_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.shared.observers.register(observer);
    }

    /// Push a notice. A zero `timeout` disables auto-dismiss.
    ///
    /// Returns the notice id for manual removal.
    pub fn push(
        &self,
        level: NotificationLevel,
        message: impl Into<String>,
        timeout: Duration,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        // newest first, matching how the list renders
        self.shared.entries.lock().insert(
            0,
            Notification {
                id,
                level,
                message: message.into(),
            },
        );

        if !timeout.is_zero() {
            let weak: Weak<CenterShared> = Arc::downgrade(&self.shared);
            let handle = tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(shared) = weak.upgrade() {
                    shared.remove(id);
                }
            });
            self.shared.timers.lock().insert(id, handle);
        }

        self.shared.observers.notify(StateChange::Notifications);
        id
    }

    /// Push an info notice with the default timeout.
    pub fn info(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Info, message, DEFAULT_TIMEOUT)
    }

    /// Push a success notice with the default timeout.
    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Success, message, DEFAULT_TIMEOUT)
    }

    /// Push a warning notice with the default timeout.
    pub fn warning(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Warning, message, DEFAULT_TIMEOUT)
    }

    /// Push an error notice with the default timeout.
    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.push(NotificationLevel::Error, message, DEFAULT_TIMEOUT)
    }

    /// Remove a notice and cancel its timer. Returns whether it existed.
    pub fn remove(&self, id: u64) -> bool {
        self.shared.remove(id)
    }

    /// Remove every notice and cancel all timers.
    pub fn clear(&self) {
        for (_, timer) in self.shared.timers.lock().drain() {
            timer.abort();
        }
        self.shared.entries.lock().clear();
        self.shared.observers.notify(StateChange::Notifications);
    }

    /// Current notices, newest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Notification> {
        self.shared.entries.lock().clone()
    }
}

impl Drop for NotificationCenter {
    fn drop(&mut self) {
        for (_, timer) in self.shared.timers.lock().drain() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_auto_dismiss_after_timeout() {
        let center = NotificationCenter::new();
        center.info("saved");
        assert_eq!(center.snapshot().len(), 1);

        tokio::time::sleep(DEFAULT_TIMEOUT + Duration::from_millis(10)).await;
        // let the dismiss task run
        tokio::task::yield_now().await;
        assert!(center.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_zero_timeout_is_sticky() {
        let center = NotificationCenter::new();
        let id = center.push(NotificationLevel::Error, "failed", Duration::ZERO);
        assert_eq!(center.snapshot().len(), 1);
        assert!(center.remove(id));
        assert!(!center.remove(id));
    }

    #[tokio::test]
    async fn test_newest_first_and_clear() {
        let center = NotificationCenter::new();
        center.push(NotificationLevel::Info, "first", Duration::ZERO);
        center.push(NotificationLevel::Warning, "second", Duration::ZERO);

        let notices = center.snapshot();
        assert_eq!(notices[0].message, "second");
        assert_eq!(notices[1].message, "first");

        center.clear();
        assert!(center.snapshot().is_empty());
    }
}
