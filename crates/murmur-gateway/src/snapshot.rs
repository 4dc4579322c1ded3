//! Snapshot payloads delivered to listeners
//!
//! A subscription delivers point-in-time result sets. Success and error
//! travel on the same channel: listener setup failures deliver one
//! snapshot with empty items and the error populated, and never unwind
//! across the subscription boundary.

use murmur_core::MurmurError;
use std::sync::Arc;

/// A point-in-time result set from a live query.
///
/// Each snapshot is authoritative as of its delivery; consumers replace
/// their view wholesale rather than patching incrementally.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    /// Full ordered result set
    pub items: Vec<T>,
    /// Error accompanying a degraded (usually empty) snapshot
    pub error: Option<MurmurError>,
}

impl<T> Snapshot<T> {
    /// A successful snapshot.
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    /// A degraded snapshot: empty items plus the error.
    pub fn failed(error: MurmurError) -> Self {
        Self {
            items: Vec::new(),
            error: Some(error),
        }
    }

    /// Whether this snapshot carries an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Listener callback for document snapshots.
///
/// Callbacks must not block: they run on the backend's notification path.
pub type Watcher<T> = Arc<dyn Fn(Snapshot<T>) + Send + Sync>;
