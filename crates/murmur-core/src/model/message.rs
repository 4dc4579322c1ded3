//! # Message model
//!
//! Messages are immutable once created apart from their delivery status,
//! which only moves forward.

use crate::identifiers::{ConversationId, MessageId, UserId};
use serde::{Deserialize, Serialize};

/// Message delivery status
///
/// Tracks the progression of a message from submission to read receipt.
/// Transitions are monotonic forward; `Failed` is terminal and reachable
/// only from `Sending` (a write that never reached the backend).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Message is being sent (not yet acknowledged)
    Sending,
    /// Message was acknowledged by the backend
    #[default]
    Sent,
    /// Message was delivered to the recipient's device
    Delivered,
    /// Message was seen by the recipient
    Seen,
    /// Message write failed (retry available)
    Failed,
}

impl MessageStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Sending => 0,
            Self::Sent => 1,
            Self::Delivered => 2,
            Self::Seen => 3,
            // Failed sits outside the forward order
            Self::Failed => u8::MAX,
        }
    }

    /// Whether this status may move to `next`.
    ///
    /// Forward movement may skip intermediate states (a backend that never
    /// reports device receipt goes Sent → Seen directly); regression is
    /// never allowed. `Failed` is reachable only from `Sending` and is
    /// terminal, as is `Seen`.
    #[must_use]
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        match (self, next) {
            (Self::Failed, _) | (Self::Seen, _) => false,
            (Self::Sending, Self::Failed) => true,
            (_, Self::Failed) => false,
            (from, to) => from.rank() < to.rank(),
        }
    }

    /// Get the status indicator character for display
    #[must_use]
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Sending => "◐",
            Self::Sent => "✓",
            Self::Delivered => "✓✓",
            Self::Seen => "✓✓",
            Self::Failed => "✗",
        }
    }

    /// Get a lowercase label for logging/serialization
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Seen => "seen",
            Self::Failed => "failed",
        }
    }

    /// Whether the message is still pending acknowledgement
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Sending)
    }

    /// Whether the message failed to send
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Whether the message can be retried (only failed messages)
    #[must_use]
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// A chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message identifier
    pub id: MessageId,
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    /// Sender identifier
    pub sender: UserId,
    /// Message body (immutable once created)
    pub body: String,
    /// Creation timestamp (ms since epoch)
    pub sent_at_ms: u64,
    /// Delivery status
    pub status: MessageStatus,
}

impl Message {
    /// Create a message in the optimistic `Sending` state.
    pub fn sending(
        conversation_id: ConversationId,
        sender: UserId,
        body: impl Into<String>,
        sent_at_ms: u64,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender,
            body: body.into(),
            sent_at_ms,
            status: MessageStatus::Sending,
        }
    }

    /// Whether this message was sent by `user`.
    #[must_use]
    pub fn is_from(&self, user: &UserId) -> bool {
        self.sender == *user
    }

    /// Advance the delivery status, ignoring regressions.
    ///
    /// Returns true when the status actually moved.
    pub fn advance_status(&mut self, next: MessageStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_moves_forward() {
        assert!(MessageStatus::Sending.can_advance_to(MessageStatus::Sent));
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Delivered));
        assert!(MessageStatus::Delivered.can_advance_to(MessageStatus::Seen));
        // skipping intermediate states is forward movement
        assert!(MessageStatus::Sent.can_advance_to(MessageStatus::Seen));
    }

    #[test]
    fn test_status_never_regresses() {
        assert!(!MessageStatus::Seen.can_advance_to(MessageStatus::Delivered));
        assert!(!MessageStatus::Delivered.can_advance_to(MessageStatus::Sent));
        assert!(!MessageStatus::Sent.can_advance_to(MessageStatus::Sending));
    }

    #[test]
    fn test_failed_only_from_sending() {
        assert!(MessageStatus::Sending.can_advance_to(MessageStatus::Failed));
        assert!(!MessageStatus::Sent.can_advance_to(MessageStatus::Failed));
        assert!(!MessageStatus::Failed.can_advance_to(MessageStatus::Sent));
        assert!(MessageStatus::Failed.can_retry());
    }

    #[test]
    fn test_advance_status_ignores_regression() {
        let conv = ConversationId::new();
        let sender = UserId::new();
        let mut msg = Message::sending(conv, sender, "hi", 1_000);
        assert!(msg.status.is_pending());
        assert!(msg.advance_status(MessageStatus::Sent));
        assert!(!msg.advance_status(MessageStatus::Sending));
        assert_eq!(msg.status, MessageStatus::Sent);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(MessageStatus::Sending.label(), "sending");
        assert_eq!(MessageStatus::Sent.label(), "sent");
        assert_eq!(MessageStatus::Delivered.label(), "delivered");
        assert_eq!(MessageStatus::Seen.label(), "seen");
        assert_eq!(MessageStatus::Failed.label(), "failed");
    }
}
