//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use murmur_app::{AuthSession, ChatStore, CompanionResponder, SessionHint};
use murmur_core::{
    Conversation, ConversationId, ConversationKind, ManualClock, Message, Result, User, UserId,
    UserPatch,
};
use murmur_gateway::{
    DocumentGateway, FirstMessage, MemoryBackend, Subscription, Watcher,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub const PASSWORD: &str = "hunter2-strong";

/// One backend, one signed-out session, one store, two seeded users.
pub struct Fixture {
    pub backend: MemoryBackend,
    pub clock: Arc<ManualClock>,
    pub session: Arc<AuthSession>,
    pub store: ChatStore,
    pub alice: UserId,
    pub bob: UserId,
    // keeps the session-hint directory alive for the test's duration
    _dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_responder(CompanionResponder::new())
    }

    pub fn with_responder(responder: CompanionResponder) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let clock = ManualClock::new(1_000);
        let backend = MemoryBackend::with_clock(clock.clone());

        let alice = UserId::new();
        let bob = UserId::new();
        backend.seed_user(
            User::new(alice, "Alice", "alice@example.com", "http://a/alice.svg", 0),
            PASSWORD,
        );
        backend.seed_user(
            User::new(bob, "Bob", "bob@example.com", "http://a/bob.svg", 0),
            PASSWORD,
        );

        let dir = tempfile::tempdir().expect("tempdir");
        let session = AuthSession::new(
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
            clock.clone(),
            SessionHint::new(dir.path().join("session.json")),
        );
        let store = ChatStore::with_responder(
            Arc::new(backend.clone()),
            session.clone(),
            clock.clone(),
            responder,
        );

        Self {
            backend,
            clock,
            session,
            store,
            alice,
            bob,
            _dir: dir,
        }
    }

    /// Sign in as Alice and arm the conversation stream.
    pub async fn signed_in(self) -> Self {
        self.session
            .login("alice@example.com", PASSWORD)
            .await
            .expect("login");
        self.store.initialize_listeners(self.alice);
        self
    }

    /// Create an Alice↔Bob conversation through the store.
    pub async fn friend_conversation(&self, seed_body: &str) -> ConversationId {
        self.store
            .start_conversation(ConversationKind::Friend, self.bob, seed_body)
            .await
            .expect("start conversation")
    }
}

/// Gateway wrapper that can swallow message-listener registrations,
/// standing in for a backend whose snapshot is still in flight.
pub struct StallingGateway {
    inner: MemoryBackend,
    stall_messages: AtomicBool,
}

impl StallingGateway {
    pub fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            stall_messages: AtomicBool::new(false),
        }
    }

    pub fn stall_messages(&self, stall: bool) {
        self.stall_messages.store(stall, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentGateway for StallingGateway {
    async fn get_user_profile(&self, id: UserId) -> Result<User> {
        self.inner.get_user_profile(id).await
    }

    async fn create_user_profile(&self, user: User) -> Result<()> {
        self.inner.create_user_profile(user).await
    }

    async fn update_user_profile(&self, id: UserId, patch: UserPatch) -> Result<()> {
        self.inner.update_user_profile(id, patch).await
    }

    fn listen_to_user_conversations(
        &self,
        user_id: UserId,
        watcher: Watcher<Conversation>,
    ) -> Subscription {
        self.inner.listen_to_user_conversations(user_id, watcher)
    }

    fn listen_to_messages(
        &self,
        conversation_id: ConversationId,
        watcher: Watcher<Message>,
    ) -> Subscription {
        if self.stall_messages.load(Ordering::SeqCst) {
            // registration succeeds but no snapshot ever arrives
            return Subscription::empty();
        }
        self.inner.listen_to_messages(conversation_id, watcher)
    }

    async fn create_conversation(
        &self,
        kind: ConversationKind,
        participants: Vec<UserId>,
        first_message: FirstMessage,
    ) -> Result<ConversationId> {
        self.inner
            .create_conversation(kind, participants, first_message)
            .await
    }

    async fn send_message(&self, conversation_id: ConversationId, message: Message) -> Result<()> {
        self.inner.send_message(conversation_id, message).await
    }

    async fn mark_messages_as_seen(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<()> {
        self.inner.mark_messages_as_seen(conversation_id, viewer).await
    }
}
