//! Typing indicator
//!
//! Tracks whether the local user is composing. Each keystroke extends a
//! short auto-expiry; switching away or sending stops it immediately.
//! The expiry is an explicit scheduled task, cancelled on re-arm so only
//! one timer is ever pending.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long after the last keystroke the indicator stays on.
pub const TYPING_TTL: Duration = Duration::from_secs(3);

struct TypingShared {
    typing: AtomicBool,
    expiry: Mutex<Option<JoinHandle<()>>>,
}

/// Local-user typing state with auto-expiry.
///
/// Requires a tokio runtime context when `start_typing` is called.
pub struct TypingIndicator {
    shared: Arc<TypingShared>,
    ttl: Duration,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl TypingIndicator {
    /// Indicator with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(TYPING_TTL)
    }

    /// Indicator with a custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            shared: Arc::new(TypingShared {
                typing: AtomicBool::new(false),
                expiry: Mutex::new(None),
            }),
            ttl,
        }
    }

    /// Whether the user is currently typing.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.shared.typing.load(Ordering::SeqCst)
    }

    /// Mark the user as typing and (re)arm the expiry.
    pub fn start_typing(&self) {
        self.shared.typing.store(true, Ordering::SeqCst);

        let weak: Weak<TypingShared> = Arc::downgrade(&self.shared);
        let ttl = self.ttl;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Some(shared) = weak.upgrade() {
                shared.typing.store(false, Ordering::SeqCst);
            }
        });

        if let Some(previous) = self.shared.expiry.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Mark the user as no longer typing and cancel the expiry.
    pub fn stop_typing(&self) {
        self.shared.typing.store(false, Ordering::SeqCst);
        if let Some(previous) = self.shared.expiry.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        if let Some(task) = self.shared.expiry.lock().take() {
            task.abort();
        }
    }
}
