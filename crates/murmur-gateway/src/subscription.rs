//! Subscription handle
//!
//! A live listen is represented by an explicit handle with a single
//! cancel capability. Consumers hold at most one handle per stream kind
//! (`Option<Subscription>`); tearing down before re-arming is how the
//! one-live-subscription invariant is kept.

/// Handle to a live listener registration.
///
/// `cancel` is synchronous and idempotent; dropping the handle cancels.
/// A snapshot already scheduled before cancellation may still be observed
/// once — consumers guard their callbacks with a generation check rather
/// than relying on cancellation being instantaneous.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a detach action.
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle with nothing to cancel.
    ///
    /// Returned when listener setup failed and the error was already
    /// delivered through the snapshot channel.
    pub fn empty() -> Self {
        Self { detach: None }
    }

    /// Cancel the registration. Safe to call on an empty handle.
    pub fn cancel(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("live", &self.detach.is_some())
            .finish()
    }
}
