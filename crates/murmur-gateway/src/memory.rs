//! In-memory reference backend
//!
//! Implements both gateway contracts against process-local tables with
//! the semantics the client is written for: filtered and ordered live
//! queries, atomic multi-document batches, and immediate initial
//! snapshots on listener registration.
//!
//! Batches mutate the tables under one lock acquisition and watchers run
//! after the lock is released, so no listener ever observes a partial
//! batch. Test controls (`set_online`, `fail_next_write`) let the error
//! paths of the client be exercised without a hosted backend.

use crate::snapshot::{Snapshot, Watcher};
use crate::subscription::Subscription;
use crate::traits::{
    AuthIdentity, AuthProvider, AuthWatcher, DocumentGateway, FirstMessage, IdentityProvider,
};
use async_trait::async_trait;
use murmur_core::{
    AuthErrorCode, Clock, Conversation, ConversationId, ConversationKind, Message, MessageId,
    MessageStatus, MurmurError, Result, SystemClock, User, UserId, UserPatch,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Minimum password length accepted by the provider's strength policy.
const MIN_PASSWORD_LEN: usize = 6;

struct IdentityRecord {
    identity: AuthIdentity,
    /// None for federated identities
    password: Option<String>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    conversations: HashMap<ConversationId, Conversation>,
    messages: HashMap<ConversationId, Vec<Message>>,
    conv_listeners: HashMap<u64, (UserId, Watcher<Conversation>)>,
    msg_listeners: HashMap<u64, (ConversationId, Watcher<Message>)>,
    auth_listeners: HashMap<u64, AuthWatcher>,
    identities: HashMap<String, IdentityRecord>,
    current_identity: Option<AuthIdentity>,
    federated_preset: Option<AuthIdentity>,
}

impl Tables {
    fn conversations_snapshot(&self, user: &UserId) -> Vec<Conversation> {
        let mut items: Vec<Conversation> = self
            .conversations
            .values()
            .filter(|c| c.is_participant(user))
            .cloned()
            .collect();
        // updated-at descending, id as a stable tie-break
        items.sort_by(|a, b| {
            b.updated_at_ms
                .cmp(&a.updated_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
        items
    }

    fn messages_snapshot(&self, conversation_id: &ConversationId) -> Vec<Message> {
        let mut items = self
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default();
        // stable sort: equal timestamps keep arrival order
        items.sort_by_key(|m| m.sent_at_ms);
        items
    }
}

/// Deliveries collected under the lock, fired after it is released.
type Pending = Vec<Box<dyn FnOnce() + Send>>;

struct Shared {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
    online: AtomicBool,
    fail_next_write: AtomicBool,
    next_listener: AtomicU64,
}

/// In-memory document store and identity provider.
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Backend stamping documents with the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Backend stamping documents with the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                clock,
                online: AtomicBool::new(true),
                fail_next_write: AtomicBool::new(false),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    /// Toggle the connectivity probe.
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    /// Make the next write operation fail with a network error, before
    /// any document changes. Demonstrates the all-or-nothing batch
    /// contract to tests.
    pub fn fail_next_write(&self) {
        self.shared.fail_next_write.store(true, Ordering::SeqCst);
    }

    /// Fix the identity returned by the federated sign-in flow.
    pub fn preset_federated_identity(&self, identity: AuthIdentity) {
        self.shared.tables.lock().federated_preset = Some(identity);
    }

    /// Register an email identity and its profile document directly,
    /// bypassing the sign-up flow. Test seeding helper.
    pub fn seed_user(&self, user: User, password: &str) {
        let mut tables = self.shared.tables.lock();
        let identity = AuthIdentity {
            uid: user.id,
            email: user.email.clone(),
            display_name: Some(user.name.clone()),
            avatar: Some(user.avatar.clone()),
            provider: AuthProvider::Email,
        };
        tables.identities.insert(
            user.email.clone(),
            IdentityRecord {
                identity,
                password: Some(password.to_string()),
            },
        );
        tables.users.insert(user.id, user);
    }

    /// Current signed-in identity, if any.
    pub fn current_identity(&self) -> Option<AuthIdentity> {
        self.shared.tables.lock().current_identity.clone()
    }

    /// Direct read of a conversation document. Test helper.
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.shared.tables.lock().conversations.get(&id).cloned()
    }

    /// Direct ordered read of a conversation's messages. Test helper.
    pub fn messages_for(&self, id: ConversationId) -> Vec<Message> {
        self.shared.tables.lock().messages_snapshot(&id)
    }

    /// Number of registered listeners across all streams. Test helper.
    pub fn listener_count(&self) -> usize {
        let tables = self.shared.tables.lock();
        tables.conv_listeners.len() + tables.msg_listeners.len() + tables.auth_listeners.len()
    }

    fn take_write_failure(&self) -> Result<()> {
        if self.shared.fail_next_write.swap(false, Ordering::SeqCst) {
            return Err(MurmurError::network("write rejected by backend"));
        }
        Ok(())
    }

    fn require_online(&self) -> Result<()> {
        if !self.shared.online.load(Ordering::SeqCst) {
            return Err(MurmurError::network("no connectivity"));
        }
        Ok(())
    }

    fn now_ms(&self) -> u64 {
        self.shared.clock.now_ms()
    }

    /// Queue conversation-snapshot deliveries for every listener watching
    /// one of `affected` users. Must be called with the table lock held;
    /// the returned closures are invoked after it is released.
    fn queue_conversation_updates(tables: &Tables, affected: &[UserId], pending: &mut Pending) {
        for (user, watcher) in tables.conv_listeners.values() {
            if affected.contains(user) {
                let snapshot = Snapshot::ok(tables.conversations_snapshot(user));
                let watcher = watcher.clone();
                pending.push(Box::new(move || watcher(snapshot)));
            }
        }
    }

    fn queue_message_updates(
        tables: &Tables,
        conversation_id: &ConversationId,
        pending: &mut Pending,
    ) {
        for (watched, watcher) in tables.msg_listeners.values() {
            if watched == conversation_id {
                let snapshot = Snapshot::ok(tables.messages_snapshot(conversation_id));
                let watcher = watcher.clone();
                pending.push(Box::new(move || watcher(snapshot)));
            }
        }
    }

    fn queue_auth_updates(tables: &Tables, pending: &mut Pending) {
        let current = tables.current_identity.clone();
        for watcher in tables.auth_listeners.values() {
            let watcher = watcher.clone();
            let current = current.clone();
            pending.push(Box::new(move || watcher(current)));
        }
    }

    fn fire(pending: Pending) {
        for delivery in pending {
            delivery();
        }
    }

    fn set_current_identity(&self, identity: Option<AuthIdentity>) {
        let mut pending = Pending::new();
        {
            let mut tables = self.shared.tables.lock();
            tables.current_identity = identity;
            Self::queue_auth_updates(&tables, &mut pending);
        }
        Self::fire(pending);
    }
}

#[async_trait]
impl DocumentGateway for MemoryBackend {
    async fn get_user_profile(&self, id: UserId) -> Result<User> {
        self.shared
            .tables
            .lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| MurmurError::not_found(format!("no profile for {id}")))
    }

    async fn create_user_profile(&self, user: User) -> Result<()> {
        self.take_write_failure()?;
        self.shared.tables.lock().users.insert(user.id, user);
        Ok(())
    }

    async fn update_user_profile(&self, id: UserId, patch: UserPatch) -> Result<()> {
        self.take_write_failure()?;
        let now = self.now_ms();
        let mut tables = self.shared.tables.lock();
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| MurmurError::not_found(format!("no profile for {id}")))?;
        user.apply(patch, now);
        Ok(())
    }

    fn listen_to_user_conversations(
        &self,
        user_id: UserId,
        watcher: Watcher<Conversation>,
    ) -> Subscription {
        if let Err(err) = self.require_online() {
            watcher(Snapshot::failed(err));
            return Subscription::empty();
        }

        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst);
        let initial = {
            let mut tables = self.shared.tables.lock();
            tables.conv_listeners.insert(id, (user_id, watcher.clone()));
            Snapshot::ok(tables.conversations_snapshot(&user_id))
        };
        debug!(listener = id, user = %user_id, "conversation listener armed");
        watcher(initial);

        let shared = self.shared.clone();
        Subscription::new(move || {
            shared.tables.lock().conv_listeners.remove(&id);
            debug!(listener = id, "conversation listener cancelled");
        })
    }

    fn listen_to_messages(
        &self,
        conversation_id: ConversationId,
        watcher: Watcher<Message>,
    ) -> Subscription {
        if let Err(err) = self.require_online() {
            watcher(Snapshot::failed(err));
            return Subscription::empty();
        }

        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst);
        let initial = {
            let mut tables = self.shared.tables.lock();
            tables
                .msg_listeners
                .insert(id, (conversation_id, watcher.clone()));
            Snapshot::ok(tables.messages_snapshot(&conversation_id))
        };
        debug!(listener = id, conversation = %conversation_id, "message listener armed");
        watcher(initial);

        let shared = self.shared.clone();
        Subscription::new(move || {
            shared.tables.lock().msg_listeners.remove(&id);
            debug!(listener = id, "message listener cancelled");
        })
    }

    async fn create_conversation(
        &self,
        kind: ConversationKind,
        participants: Vec<UserId>,
        first_message: FirstMessage,
    ) -> Result<ConversationId> {
        self.take_write_failure()?;
        let now = self.now_ms();

        let mut conversation =
            Conversation::new(ConversationId::new(), kind, participants, now)?;
        if !conversation.is_participant(&first_message.sender) {
            return Err(MurmurError::unauthorized(
                "seed message sender is not a participant",
            ));
        }
        let id = conversation.id;
        let message = Message {
            id: MessageId::new(),
            conversation_id: id,
            sender: first_message.sender,
            body: first_message.body,
            sent_at_ms: now,
            status: MessageStatus::Sent,
        };
        conversation.record_message(&message);

        let mut pending = Pending::new();
        {
            let mut tables = self.shared.tables.lock();
            let affected = conversation.participants().to_vec();
            tables.conversations.insert(id, conversation);
            tables.messages.entry(id).or_default().push(message);
            Self::queue_conversation_updates(&tables, &affected, &mut pending);
            Self::queue_message_updates(&tables, &id, &mut pending);
        }
        Self::fire(pending);
        Ok(id)
    }

    async fn send_message(&self, conversation_id: ConversationId, message: Message) -> Result<()> {
        self.take_write_failure()?;
        let now = self.now_ms();

        let mut pending = Pending::new();
        {
            let mut tables = self.shared.tables.lock();
            let conversation = tables
                .conversations
                .get_mut(&conversation_id)
                .ok_or_else(|| {
                    MurmurError::not_found(format!("no conversation {conversation_id}"))
                })?;
            if !conversation.is_participant(&message.sender) {
                return Err(MurmurError::unauthorized(
                    "sender is not a participant of this conversation",
                ));
            }

            // The backend acknowledges the write: authoritative timestamp,
            // status advanced out of the optimistic Sending state.
            let mut stored = message;
            stored.sent_at_ms = now;
            stored.advance_status(MessageStatus::Sent);

            conversation.record_message(&stored);
            let affected = conversation.participants().to_vec();
            tables
                .messages
                .entry(conversation_id)
                .or_default()
                .push(stored);
            Self::queue_conversation_updates(&tables, &affected, &mut pending);
            Self::queue_message_updates(&tables, &conversation_id, &mut pending);
        }
        Self::fire(pending);
        Ok(())
    }

    async fn mark_messages_as_seen(
        &self,
        conversation_id: ConversationId,
        viewer: UserId,
    ) -> Result<()> {
        self.take_write_failure()?;

        let mut pending = Pending::new();
        {
            let mut tables = self.shared.tables.lock();
            let conversation = tables
                .conversations
                .get_mut(&conversation_id)
                .ok_or_else(|| {
                    MurmurError::not_found(format!("no conversation {conversation_id}"))
                })?;
            if !conversation.is_participant(&viewer) {
                return Err(MurmurError::unauthorized(
                    "viewer is not a participant of this conversation",
                ));
            }
            conversation.clear_unread(&viewer);
            let affected = conversation.participants().to_vec();

            let mut changed = false;
            if let Some(messages) = tables.messages.get_mut(&conversation_id) {
                for message in messages.iter_mut().filter(|m| !m.is_from(&viewer)) {
                    changed |= message.advance_status(MessageStatus::Seen);
                }
            }
            Self::queue_conversation_updates(&tables, &affected, &mut pending);
            if changed {
                Self::queue_message_updates(&tables, &conversation_id, &mut pending);
            }
        }
        Self::fire(pending);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        self.require_online()?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(MurmurError::auth(
                AuthErrorCode::WeakPassword,
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        let identity = {
            let mut tables = self.shared.tables.lock();
            if tables.identities.contains_key(email) {
                return Err(MurmurError::auth(
                    AuthErrorCode::EmailInUse,
                    format!("an identity already exists for {email}"),
                ));
            }
            let identity = AuthIdentity {
                uid: UserId::new(),
                email: email.to_string(),
                display_name: None,
                avatar: None,
                provider: AuthProvider::Email,
            };
            tables.identities.insert(
                email.to_string(),
                IdentityRecord {
                    identity: identity.clone(),
                    password: Some(password.to_string()),
                },
            );
            identity
        };
        self.set_current_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthIdentity> {
        self.require_online()?;
        let identity = {
            let tables = self.shared.tables.lock();
            match tables.identities.get(email) {
                Some(record) if record.password.as_deref() == Some(password) => {
                    record.identity.clone()
                }
                // Unknown email and wrong password are indistinguishable
                _ => {
                    return Err(MurmurError::auth(
                        AuthErrorCode::InvalidCredential,
                        "email or password rejected",
                    ))
                }
            }
        };
        self.set_current_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in_federated(&self) -> Result<AuthIdentity> {
        self.require_online()?;
        let identity = {
            let mut tables = self.shared.tables.lock();
            let preset = tables.federated_preset.clone().unwrap_or_else(|| {
                AuthIdentity {
                    uid: UserId::new(),
                    email: "federated@example.com".to_string(),
                    display_name: Some("Federated User".to_string()),
                    avatar: None,
                    provider: AuthProvider::Federated,
                }
            });
            // Re-use the uid of an identity that signed in before, so a
            // returning federated account keeps its profile document.
            let identity = match tables.identities.get(&preset.email) {
                Some(record) => record.identity.clone(),
                None => {
                    tables.identities.insert(
                        preset.email.clone(),
                        IdentityRecord {
                            identity: preset.clone(),
                            password: None,
                        },
                    );
                    preset
                }
            };
            identity
        };
        self.set_current_identity(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.set_current_identity(None);
        Ok(())
    }

    fn subscribe_auth_state(&self, watcher: AuthWatcher) -> Subscription {
        let id = self.shared.next_listener.fetch_add(1, Ordering::SeqCst);
        let current = {
            let mut tables = self.shared.tables.lock();
            tables.auth_listeners.insert(id, watcher.clone());
            tables.current_identity.clone()
        };
        debug!(listener = id, "auth listener armed");
        watcher(current);

        let shared = self.shared.clone();
        Subscription::new(move || {
            shared.tables.lock().auth_listeners.remove(&id);
            debug!(listener = id, "auth listener cancelled");
        })
    }

    fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }
}
