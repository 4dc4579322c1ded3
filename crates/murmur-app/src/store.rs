//! Conversation synchronization store
//!
//! Owns the live view of "my conversations" and the open conversation's
//! messages. At most one subscription is live per stream kind; starting
//! a new one always tears down the old one first. Snapshots replace state
//! wholesale — each callback is authoritative as of its delivery — and a
//! generation counter per stream makes snapshots that were already
//! scheduled when a subscription was cancelled harmless.
//!
//! Sends are optimistic: the message appears locally in the `Sending`
//! state, the gateway writes it together with the conversation's
//! denormalized fields in one atomic batch, and the authoritative
//! snapshot then replaces the optimistic copy. A failed write marks the
//! local copy `Failed`; the UI owns resend.

use crate::companion::CompanionResponder;
use crate::observer::{Observers, StateChange, StoreObserver};
use crate::session::AuthSession;
use murmur_core::{
    Clock, Conversation, ConversationId, ConversationKind, Message, MessageId, MessageStatus,
    MurmurError, Result, UserId,
};
use murmur_gateway::{DocumentGateway, FirstMessage, Subscription, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Default)]
struct ChatState {
    conversations: Vec<Conversation>,
    active: Option<ConversationId>,
    messages: Vec<Message>,
    cache: HashMap<ConversationId, Vec<Message>>,
    loading: bool,
    companion_typing: Option<ConversationId>,
    last_error: Option<MurmurError>,
}

/// State shared with subscription callbacks and scheduled tasks.
struct StoreShared {
    state: Mutex<ChatState>,
    observers: Observers,
    /// Bumped whenever the conversation stream is (re)armed or torn down
    conv_gen: AtomicU64,
    /// Bumped whenever the message stream is (re)armed or torn down
    msg_gen: AtomicU64,
}

/// Live, consistent view of the current user's conversations.
///
/// Construct once per process next to the [`AuthSession`] and share by
/// reference. Methods that schedule work require a tokio runtime context.
pub struct ChatStore {
    gateway: Arc<dyn DocumentGateway>,
    session: Arc<AuthSession>,
    clock: Arc<dyn Clock>,
    responder: Arc<CompanionResponder>,
    shared: Arc<StoreShared>,
    conv_sub: Mutex<Option<Subscription>>,
    msg_sub: Mutex<Option<Subscription>>,
    companion_task: Mutex<Option<JoinHandle<()>>>,
}

impl ChatStore {
    /// Create a store over the given collaborators.
    pub fn new(
        gateway: Arc<dyn DocumentGateway>,
        session: Arc<AuthSession>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_responder(gateway, session, clock, CompanionResponder::new())
    }

    /// Create a store with a custom companion responder.
    pub fn with_responder(
        gateway: Arc<dyn DocumentGateway>,
        session: Arc<AuthSession>,
        clock: Arc<dyn Clock>,
        responder: CompanionResponder,
    ) -> Self {
        Self {
            gateway,
            session,
            clock,
            responder: Arc::new(responder),
            shared: Arc::new(StoreShared {
                state: Mutex::new(ChatState::default()),
                observers: Observers::new(),
                conv_gen: AtomicU64::new(0),
                msg_gen: AtomicU64::new(0),
            }),
            conv_sub: Mutex::new(None),
            msg_sub: Mutex::new(None),
            companion_task: Mutex::new(None),
        }
    }

    /// Register an observer for store changes.
    pub fn register_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.shared.observers.register(observer);
    }

    /// Tear down any prior conversation subscription and arm exactly one
    /// for `user_id`, ordered by last update descending. Each snapshot
    /// replaces the conversation collection wholesale.
    pub fn initialize_listeners(&self, user_id: UserId) {
        if let Some(sub) = self.conv_sub.lock().take() {
            sub.cancel();
        }
        let my_gen = self.shared.conv_gen.fetch_add(1, Ordering::SeqCst) + 1;

        let shared = self.shared.clone();
        let watcher: Watcher<Conversation> = Arc::new(move |snapshot| {
            // delivery scheduled before a teardown; ignore
            if shared.conv_gen.load(Ordering::SeqCst) != my_gen {
                return;
            }
            {
                let mut state = shared.state.lock();
                if let Some(err) = snapshot.error {
                    state.last_error = Some(err);
                }
                state.conversations = snapshot.items;
            }
            shared.observers.notify(StateChange::Conversations);
        });

        let sub = self.gateway.listen_to_user_conversations(user_id, watcher);
        *self.conv_sub.lock() = Some(sub);
        debug!(user = %user_id, "conversation stream armed");
    }

    /// Switch the open conversation.
    ///
    /// Tears down the previous message subscription and any pending
    /// companion reply first. With `Some(id)`, the cached message list
    /// (when present) becomes visible before the fresh subscription
    /// delivers, then not-from-self messages are marked seen best-effort.
    ///
    /// # Errors
    /// `NotFound` when `id` is not in the local conversation collection.
    pub async fn set_active_conversation(
        &self,
        conversation_id: Option<ConversationId>,
    ) -> Result<()> {
        if let Some(sub) = self.msg_sub.lock().take() {
            sub.cancel();
        }
        self.cancel_companion();
        let my_gen = self.shared.msg_gen.fetch_add(1, Ordering::SeqCst) + 1;

        let Some(id) = conversation_id else {
            {
                let mut state = self.shared.state.lock();
                state.active = None;
                state.messages.clear();
            }
            self.shared.observers.notify(StateChange::ActiveConversation);
            self.shared.observers.notify(StateChange::Messages);
            return Ok(());
        };

        self.set_loading(true);
        let cached = {
            let mut state = self.shared.state.lock();
            if !state.conversations.iter().any(|c| c.id == id) {
                state.loading = false;
                drop(state);
                let err =
                    MurmurError::not_found(format!("{id} is not in the conversation collection"));
                return Err(self.record_error(err));
            }
            state.active = Some(id);
            state.cache.get(&id).cloned()
        };
        self.shared.observers.notify(StateChange::ActiveConversation);

        // the cached view avoids a visible empty state while the fresh
        // snapshot is in flight
        if let Some(messages) = cached {
            self.shared.state.lock().messages = messages;
            self.shared.observers.notify(StateChange::Messages);
        }

        let shared = self.shared.clone();
        let watcher: Watcher<Message> = Arc::new(move |snapshot| {
            if shared.msg_gen.load(Ordering::SeqCst) != my_gen {
                return;
            }
            {
                let mut state = shared.state.lock();
                if let Some(err) = snapshot.error {
                    state.last_error = Some(err);
                }
                state.cache.insert(id, snapshot.items.clone());
                state.messages = snapshot.items;
            }
            shared.observers.notify(StateChange::Messages);
        });
        let sub = self.gateway.listen_to_messages(id, watcher);
        *self.msg_sub.lock() = Some(sub);
        debug!(conversation = %id, "message stream armed");

        if let Some(user) = self.session.current_user() {
            if let Err(err) = self.gateway.mark_messages_as_seen(id, user.id).await {
                warn!(conversation = %id, error = %err, "failed to mark messages as seen");
            }
        }
        self.set_loading(false);
        Ok(())
    }

    /// Send a message to a conversation.
    ///
    /// The message and the conversation's denormalized fields are written
    /// as one atomic batch. On a Companion conversation, one scripted
    /// reply is scheduled after the write settles.
    ///
    /// # Errors
    /// `State` without a session, `Validation` for an empty body,
    /// `NotFound` for an unknown conversation, `Unauthorized` when the
    /// sender is not a participant. A failed write leaves the optimistic
    /// message visible in the `Failed` state.
    pub async fn send_message(&self, conversation_id: ConversationId, body: &str) -> Result<()> {
        let sender = self
            .session
            .current_user()
            .ok_or_else(|| MurmurError::state("no active session"))?;
        let body = body.trim();
        if body.is_empty() {
            return Err(MurmurError::validation("message body is empty"));
        }

        let conversation = {
            let state = self.shared.state.lock();
            state
                .conversations
                .iter()
                .find(|c| c.id == conversation_id)
                .cloned()
        };
        let Some(conversation) = conversation else {
            let err = MurmurError::not_found(format!(
                "{conversation_id} is not in the conversation collection"
            ));
            return Err(self.record_error(err));
        };
        if !conversation.is_participant(&sender.id) {
            let err =
                MurmurError::unauthorized("sender is not a participant of this conversation");
            return Err(self.record_error(err));
        }

        let message = Message::sending(conversation_id, sender.id, body, self.clock.now_ms());

        // optimistic echo: the sender sees the message immediately
        {
            let mut state = self.shared.state.lock();
            if state.active == Some(conversation_id) {
                state.messages.push(message.clone());
            }
            state
                .cache
                .entry(conversation_id)
                .or_default()
                .push(message.clone());
        }
        self.shared.observers.notify(StateChange::Messages);

        if let Err(err) = self.gateway.send_message(conversation_id, message.clone()).await {
            {
                let mut state = self.shared.state.lock();
                mark_failed(&mut state.messages, message.id);
                if let Some(cached) = state.cache.get_mut(&conversation_id) {
                    mark_failed(cached, message.id);
                }
                state.last_error = Some(err.clone());
            }
            self.shared.observers.notify(StateChange::Messages);
            return Err(err);
        }

        if conversation.kind == ConversationKind::Companion {
            self.schedule_companion_reply(&conversation, sender.id);
        }
        Ok(())
    }

    /// Create a two-participant conversation with a seed message, as one
    /// atomic batch, and return its id.
    ///
    /// # Errors
    /// `State` without a session, `Validation` for an empty body or a
    /// self-conversation.
    pub async fn start_conversation(
        &self,
        kind: ConversationKind,
        other_user: UserId,
        first_body: &str,
    ) -> Result<ConversationId> {
        let me = self
            .session
            .current_user()
            .ok_or_else(|| MurmurError::state("no active session"))?;
        let body = first_body.trim();
        if body.is_empty() {
            return Err(MurmurError::validation("first message body is empty"));
        }
        if other_user == me.id {
            return Err(MurmurError::validation(
                "cannot start a conversation with yourself",
            ));
        }

        match self
            .gateway
            .create_conversation(kind, vec![me.id, other_user], FirstMessage::new(me.id, body))
            .await
        {
            Ok(id) => Ok(id),
            Err(err) => Err(self.record_error(err)),
        }
    }

    /// Cancel both subscriptions and any pending companion reply, and
    /// clear the message cache. Safe to call when nothing is armed.
    pub fn cleanup(&self) {
        if let Some(sub) = self.conv_sub.lock().take() {
            sub.cancel();
        }
        if let Some(sub) = self.msg_sub.lock().take() {
            sub.cancel();
        }
        // in-flight deliveries scheduled before the cancel drop out here
        self.shared.conv_gen.fetch_add(1, Ordering::SeqCst);
        self.shared.msg_gen.fetch_add(1, Ordering::SeqCst);
        self.cancel_companion();
        self.shared.state.lock().cache.clear();
        debug!("store cleaned up");
    }

    /// Conversation collection, newest activity first.
    #[must_use]
    pub fn conversations(&self) -> Vec<Conversation> {
        self.shared.state.lock().conversations.clone()
    }

    /// The open conversation, when one is selected and still present.
    #[must_use]
    pub fn active_conversation(&self) -> Option<Conversation> {
        let state = self.shared.state.lock();
        let active = state.active?;
        state.conversations.iter().find(|c| c.id == active).cloned()
    }

    /// Visible message list for the open conversation.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().messages.clone()
    }

    /// Total unread count across conversations for the session user.
    #[must_use]
    pub fn unread_total(&self) -> u32 {
        let Some(user) = self.session.current_user() else {
            return 0;
        };
        self.shared
            .state
            .lock()
            .conversations
            .iter()
            .map(|c| c.unread_for(&user.id))
            .sum()
    }

    /// Whether a conversation switch is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.state.lock().loading
    }

    /// The conversation a companion is "typing" in, if any.
    #[must_use]
    pub fn companion_typing(&self) -> Option<ConversationId> {
        self.shared.state.lock().companion_typing
    }

    /// Most recent store-level failure.
    #[must_use]
    pub fn last_error(&self) -> Option<MurmurError> {
        self.shared.state.lock().last_error.clone()
    }

    /// Schedule the single scripted reply for a companion conversation.
    ///
    /// The task is cancelled by a conversation switch or cleanup, and the
    /// generation captured here makes a task that outlives its stream a
    /// no-op, so a stale reply can never land after a switch.
    fn schedule_companion_reply(&self, conversation: &Conversation, sender: UserId) {
        let Some(companion) = conversation.peer_of(&sender) else {
            return;
        };
        let conversation_id = conversation.id;
        let my_gen = self.shared.msg_gen.load(Ordering::SeqCst);

        self.shared.state.lock().companion_typing = Some(conversation_id);
        self.shared.observers.notify(StateChange::CompanionTyping);

        let shared = self.shared.clone();
        let gateway = self.gateway.clone();
        let responder = self.responder.clone();
        let clock = self.clock.clone();
        let delay = self.responder.delay();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if shared.msg_gen.load(Ordering::SeqCst) != my_gen {
                debug!(conversation = %conversation_id, "companion reply abandoned after switch");
                return;
            }
            let reply = Message::sending(
                conversation_id,
                companion,
                responder.next_reply(),
                clock.now_ms(),
            );
            if let Err(err) = gateway.send_message(conversation_id, reply).await {
                warn!(conversation = %conversation_id, error = %err, "companion reply failed");
            }
            let mut state = shared.state.lock();
            if state.companion_typing == Some(conversation_id) {
                state.companion_typing = None;
                drop(state);
                shared.observers.notify(StateChange::CompanionTyping);
            }
        });
        if let Some(previous) = self.companion_task.lock().replace(handle) {
            previous.abort();
        }
    }

    fn cancel_companion(&self) {
        if let Some(task) = self.companion_task.lock().take() {
            task.abort();
        }
        let mut state = self.shared.state.lock();
        if state.companion_typing.take().is_some() {
            drop(state);
            self.shared.observers.notify(StateChange::CompanionTyping);
        }
    }

    fn record_error(&self, err: MurmurError) -> MurmurError {
        self.shared.state.lock().last_error = Some(err.clone());
        err
    }

    fn set_loading(&self, loading: bool) {
        self.shared.state.lock().loading = loading;
    }
}

impl Drop for ChatStore {
    fn drop(&mut self) {
        // subscriptions cancel on drop; the reply task would outlive us
        if let Some(task) = self.companion_task.lock().take() {
            task.abort();
        }
    }
}

fn mark_failed(messages: &mut [Message], id: MessageId) {
    if let Some(message) = messages.iter_mut().find(|m| m.id == id) {
        message.advance_status(MessageStatus::Failed);
    }
}
