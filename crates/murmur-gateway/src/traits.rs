//! Gateway and identity-provider contracts
//!
//! These traits are the seam between the client stores and whatever
//! hosted backend provides persistence and authentication. The in-memory
//! backend in this crate is the reference implementation; a hosted
//! backend adapter implements the same two traits.

use crate::snapshot::Watcher;
use crate::subscription::Subscription;
use async_trait::async_trait;
use murmur_core::{
    Conversation, ConversationId, ConversationKind, Message, Result, User, UserId, UserPatch,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Seed message supplied when creating a conversation.
///
/// The backend assigns the conversation and message identifiers and the
/// authoritative timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstMessage {
    /// Sender (must be one of the participants)
    pub sender: UserId,
    /// Message body
    pub body: String,
}

impl FirstMessage {
    /// Convenience constructor.
    pub fn new(sender: UserId, body: impl Into<String>) -> Self {
        Self {
            sender,
            body: body.into(),
        }
    }
}

/// Document-store contract over the `users`, `conversations`, and
/// `conversations/{id}/messages` collections.
///
/// Every write that touches more than one document is atomic: all
/// documents change or none do, and no listener observes a partial batch.
#[async_trait]
pub trait DocumentGateway: Send + Sync {
    /// Fetch a user profile document.
    ///
    /// # Errors
    /// `NotFound` when no profile exists for `id`.
    async fn get_user_profile(&self, id: UserId) -> Result<User>;

    /// Create (or replace) a user profile document.
    async fn create_user_profile(&self, user: User) -> Result<()>;

    /// Merge a partial update into an existing profile document.
    ///
    /// # Errors
    /// `NotFound` when no profile exists for `id`.
    async fn update_user_profile(&self, id: UserId, patch: UserPatch) -> Result<()>;

    /// Listen to the conversations `user_id` participates in, ordered by
    /// last update descending. The watcher receives the current result
    /// set immediately and a full replacement on every change.
    fn listen_to_user_conversations(
        &self,
        user_id: UserId,
        watcher: Watcher<Conversation>,
    ) -> Subscription;

    /// Listen to a conversation's messages ordered by creation time
    /// ascending. Same delivery contract as
    /// [`listen_to_user_conversations`](Self::listen_to_user_conversations).
    fn listen_to_messages(
        &self,
        conversation_id: ConversationId,
        watcher: Watcher<Message>,
    ) -> Subscription;

    /// Create a conversation together with its seed message and
    /// last-message snapshot, atomically.
    ///
    /// # Errors
    /// `Validation` for a malformed participant set, `Unauthorized` when
    /// the seed sender is not a participant.
    async fn create_conversation(
        &self,
        kind: ConversationKind,
        participants: Vec<UserId>,
        first_message: FirstMessage,
    ) -> Result<ConversationId>;

    /// Append a message and refresh the conversation's last-message
    /// snapshot, activity timestamp, and unread counters, atomically.
    ///
    /// # Errors
    /// `NotFound` for an unknown conversation, `Unauthorized` when the
    /// sender is not a participant.
    async fn send_message(&self, conversation_id: ConversationId, message: Message) -> Result<()>;

    /// Mark every message not sent by `viewer` as seen and reset the
    /// viewer's unread counter, atomically. Status advancement is
    /// monotonic; already-seen messages are untouched.
    ///
    /// # Errors
    /// `NotFound` for an unknown conversation, `Unauthorized` when the
    /// viewer is not a participant.
    async fn mark_messages_as_seen(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<()>;
}

/// Which mechanism authenticated an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthProvider {
    /// Email/password credential
    Email,
    /// Federated sign-in
    Federated,
}

impl AuthProvider {
    /// Provider label as persisted on profile documents.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Federated => "federated",
        }
    }
}

/// Native identity held by the auth provider.
///
/// This is what the auth-state stream carries; the session layer merges
/// it with the matching profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Provider uid; doubles as the profile document key
    pub uid: UserId,
    /// Account email
    pub email: String,
    /// Display name, when the provider knows one
    pub display_name: Option<String>,
    /// Avatar URI, when the provider knows one
    pub avatar: Option<String>,
    /// Which mechanism authenticated this identity
    pub provider: AuthProvider,
}

/// Callback for auth-state changes. `None` means no session.
pub type AuthWatcher = Arc<dyn Fn(Option<AuthIdentity>) + Send + Sync>;

/// Identity-provider contract: credential auth, federated auth, and the
/// session-state change stream.
///
/// Provider error codes surface verbatim in the `Auth` error variant;
/// nothing here retries automatically.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an email/password identity and sign it in.
    ///
    /// # Errors
    /// `Auth(email-in-use)`, `Auth(weak-password)`, or `Network`.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthIdentity>;

    /// Authenticate an email/password credential.
    ///
    /// # Errors
    /// `Auth(invalid-credential)` or `Network`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity>;

    /// Authenticate through the federated provider flow.
    async fn sign_in_federated(&self) -> Result<AuthIdentity>;

    /// End the current session. Idempotent.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to session-state changes. The watcher receives the
    /// current state immediately and every subsequent change.
    fn subscribe_auth_state(&self, watcher: AuthWatcher) -> Subscription;

    /// Connectivity probe.
    fn is_online(&self) -> bool;
}
