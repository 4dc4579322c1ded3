//! # Conversation model
//!
//! A conversation is a thread between a fixed set of participants. The
//! membership set is validated at construction and never mutated; the
//! last-message snapshot and unread counters are derived state maintained
//! by the backend on every message write.

use crate::errors::{MurmurError, Result};
use crate::identifiers::{ConversationId, UserId};
use crate::model::message::Message;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConversationKind {
    /// Chat with a scripted companion; sends trigger a synthesized reply
    Companion,
    /// Chat with another person
    #[default]
    Friend,
}

impl ConversationKind {
    /// Get a short label for this kind
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Companion => "companion",
            Self::Friend => "friend",
        }
    }
}

/// Denormalized snapshot of the most recent message, kept on the
/// conversation for list display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    /// Body of the most recent message
    pub body: String,
    /// Sender of the most recent message
    pub sender: UserId,
    /// Creation timestamp of the most recent message (ms since epoch)
    pub sent_at_ms: u64,
}

impl From<&Message> for LastMessage {
    fn from(message: &Message) -> Self {
        Self {
            body: message.body.clone(),
            sender: message.sender,
            sent_at_ms: message.sent_at_ms,
        }
    }
}

/// A conversation between a fixed set of participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Conversation identifier
    pub id: ConversationId,
    /// Kind of conversation
    pub kind: ConversationKind,
    /// Fixed membership set, ordered as given at creation
    participants: Vec<UserId>,
    /// Snapshot of the most recent message
    pub last_message: Option<LastMessage>,
    /// Creation timestamp (ms since epoch)
    pub created_at_ms: u64,
    /// Last-activity timestamp, refreshed on every message (ms since epoch)
    pub updated_at_ms: u64,
    /// Unread message count per viewer
    unread: HashMap<UserId, u32>,
}

impl Conversation {
    /// Create a conversation.
    ///
    /// # Errors
    /// `Validation` when fewer than two distinct participants are given.
    pub fn new(
        id: ConversationId,
        kind: ConversationKind,
        participants: Vec<UserId>,
        created_at_ms: u64,
    ) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        if !participants.iter().all(|p| seen.insert(*p)) {
            return Err(MurmurError::validation("participants must be distinct"));
        }
        if participants.len() < 2 {
            return Err(MurmurError::validation(
                "a conversation requires at least two participants",
            ));
        }
        Ok(Self {
            id,
            kind,
            participants,
            last_message: None,
            created_at_ms,
            updated_at_ms: created_at_ms,
            unread: HashMap::new(),
        })
    }

    /// The fixed membership set.
    #[must_use]
    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    /// Whether `user` belongs to this conversation.
    #[must_use]
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// The first participant other than `user`.
    ///
    /// For two-party conversations this is the peer.
    #[must_use]
    pub fn peer_of(&self, user: &UserId) -> Option<UserId> {
        self.participants.iter().find(|p| *p != user).copied()
    }

    /// Unread count for a viewer.
    #[must_use]
    pub fn unread_for(&self, viewer: &UserId) -> u32 {
        self.unread.get(viewer).copied().unwrap_or(0)
    }

    /// Fold a new message into the derived fields: refresh the
    /// last-message snapshot and activity timestamp, and bump unread
    /// counters for everyone but the sender.
    pub fn record_message(&mut self, message: &Message) {
        self.last_message = Some(LastMessage::from(message));
        self.updated_at_ms = message.sent_at_ms;
        for participant in &self.participants {
            if *participant != message.sender {
                let count = self.unread.entry(*participant).or_insert(0);
                *count = count.saturating_add(1);
            }
        }
    }

    /// Reset a viewer's unread counter (call when the viewer opens the
    /// conversation).
    pub fn clear_unread(&mut self, viewer: &UserId) {
        self.unread.remove(viewer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::Message;

    fn two_party(a: UserId, b: UserId) -> Conversation {
        Conversation::new(
            ConversationId::new(),
            ConversationKind::Friend,
            vec![a, b],
            1_000,
        )
        .unwrap()
    }

    #[test]
    fn test_requires_two_distinct_participants() {
        let a = UserId::new();
        assert!(matches!(
            Conversation::new(ConversationId::new(), ConversationKind::Friend, vec![a], 0),
            Err(MurmurError::Validation { .. })
        ));
        assert!(matches!(
            Conversation::new(
                ConversationId::new(),
                ConversationKind::Friend,
                vec![a, a],
                0
            ),
            Err(MurmurError::Validation { .. })
        ));
    }

    #[test]
    fn test_membership_queries() {
        let a = UserId::new();
        let b = UserId::new();
        let outsider = UserId::new();
        let conv = two_party(a, b);

        assert!(conv.is_participant(&a));
        assert!(!conv.is_participant(&outsider));
        assert_eq!(conv.peer_of(&a), Some(b));
        assert_eq!(conv.peer_of(&b), Some(a));
    }

    #[test]
    fn test_record_message_updates_derived_fields() {
        let a = UserId::new();
        let b = UserId::new();
        let mut conv = two_party(a, b);

        let msg = Message::sending(conv.id, a, "hello", 2_000);
        conv.record_message(&msg);

        let last = conv.last_message.as_ref().unwrap();
        assert_eq!(last.body, "hello");
        assert_eq!(last.sender, a);
        assert_eq!(conv.updated_at_ms, 2_000);
        assert_eq!(conv.unread_for(&b), 1);
        assert_eq!(conv.unread_for(&a), 0);

        conv.clear_unread(&b);
        assert_eq!(conv.unread_for(&b), 0);
    }
}
