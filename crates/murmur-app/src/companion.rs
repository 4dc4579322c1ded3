//! Scripted companion replies
//!
//! Companion conversations answer every user message with a line from a
//! fixed response table after a short "typing" delay. Selection is a
//! deterministic round-robin; there is no ambient randomness anywhere in
//! the client.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// The fixed response table.
pub const COMPANION_REPLIES: [&str; 5] = [
    "That's fascinating! Tell me more.",
    "I'd love to hear more about that!",
    "How interesting! What else do you enjoy?",
    "That's really cool! What got you interested in that?",
    "I can see why you'd enjoy that. Tell me more!",
];

/// Default simulated typing delay before a companion reply lands.
pub const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(1_500);

/// Supplies companion reply bodies and the typing delay.
pub struct CompanionResponder {
    replies: Vec<String>,
    next: AtomicUsize,
    delay: Duration,
}

impl Default for CompanionResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl CompanionResponder {
    /// Responder over the fixed table with the default delay.
    pub fn new() -> Self {
        Self {
            replies: COMPANION_REPLIES.iter().map(|s| s.to_string()).collect(),
            next: AtomicUsize::new(0),
            delay: DEFAULT_TYPING_DELAY,
        }
    }

    /// Override the typing delay.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// The typing delay applied before each reply.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Next reply body, cycling through the table.
    pub fn next_reply(&self) -> String {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[index].clone()
    }

    /// Whether `body` is one of this responder's replies.
    #[must_use]
    pub fn knows(&self, body: &str) -> bool {
        self.replies.iter().any(|r| r == body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_cycle_through_the_table() {
        let responder = CompanionResponder::new();
        let mut seen = Vec::new();
        for _ in 0..COMPANION_REPLIES.len() {
            seen.push(responder.next_reply());
        }
        assert_eq!(seen, COMPANION_REPLIES.to_vec());
        // wraps around
        assert_eq!(responder.next_reply(), COMPANION_REPLIES[0]);
    }

    #[test]
    fn test_knows_matches_only_table_entries() {
        let responder = CompanionResponder::new();
        assert!(responder.knows(COMPANION_REPLIES[2]));
        assert!(!responder.knows("something I never said"));
    }
}
