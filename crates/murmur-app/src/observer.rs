//! Change notification seam
//!
//! Frontends observe state through a plain callback trait rather than a
//! framework reactivity primitive: the stores mutate owned state, then
//! tell every registered observer which slice moved. Observers re-read
//! through the store's accessors; no state travels with the change.

use parking_lot::RwLock;
use std::sync::Arc;

/// Which slice of client state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    /// Session identity or its loading/error flags
    Session,
    /// The conversation collection
    Conversations,
    /// The active conversation selection
    ActiveConversation,
    /// The visible message list
    Messages,
    /// The companion typing flag
    CompanionTyping,
    /// The transient notification list
    Notifications,
}

/// Observer callback registered by a frontend.
///
/// Called synchronously on the mutating path; implementations must be
/// cheap and must not call back into the store.
pub trait StoreObserver: Send + Sync {
    /// A slice of state changed; re-read through the store's accessors.
    fn state_changed(&self, change: StateChange);
}

/// Registry of observers shared by a store.
#[derive(Default)]
pub struct Observers {
    inner: RwLock<Vec<Arc<dyn StoreObserver>>>,
}

impl Observers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for the lifetime of the store.
    pub fn register(&self, observer: Arc<dyn StoreObserver>) {
        self.inner.write().push(observer);
    }

    /// Notify every observer of a change.
    pub fn notify(&self, change: StateChange) {
        let observers = self.inner.read().clone();
        for observer in observers {
            observer.state_changed(change);
        }
    }
}
