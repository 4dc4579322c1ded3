//! Auth session manager
//!
//! Mirrors the identity provider's auth-state stream into local state and
//! owns the account operations: register, login (credential and
//! federated), logout, and profile updates. Every operation returns a
//! tagged result; nothing retries automatically and provider error codes
//! pass through verbatim.

use crate::hint::SessionHint;
use crate::observer::{Observers, StateChange, StoreObserver};
use murmur_core::{Clock, MurmurError, Result, User, UserId, UserPatch};
use murmur_gateway::{AuthIdentity, DocumentGateway, IdentityProvider, Subscription};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Session slice of client state.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Current merged identity, `None` when signed out
    pub user: Option<User>,
    /// Whether an auth operation or profile fetch is in flight
    pub loading: bool,
    /// Whether the first auth-state resolution has completed
    pub initialized: bool,
    /// Most recent operation failure
    pub last_error: Option<MurmurError>,
}

/// Tracks the current user identity and account operations.
///
/// Construct once at process start and share by `Arc`; the store layer
/// reads the session to authorize its writes.
pub struct AuthSession {
    gateway: Arc<dyn DocumentGateway>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    hint: SessionHint,
    state: Mutex<SessionState>,
    observers: Observers,
    auth_sub: Mutex<Option<Subscription>>,
    /// Sequence of auth-state deliveries; stale handlers drop out
    auth_seq: AtomicU64,
    /// Serializes auth mutations against the stream handler
    ops: tokio::sync::Mutex<()>,
    init_tx: Mutex<Option<oneshot::Sender<()>>>,
    init_started: AtomicBool,
}

impl AuthSession {
    /// Create a session manager over the given collaborators.
    pub fn new(
        gateway: Arc<dyn DocumentGateway>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        hint: SessionHint,
    ) -> Arc<Self> {
        Arc::new(Self {
            gateway,
            identity,
            clock,
            hint,
            state: Mutex::new(SessionState::default()),
            observers: Observers::new(),
            auth_sub: Mutex::new(None),
            auth_seq: AtomicU64::new(0),
            ops: tokio::sync::Mutex::new(()),
            init_tx: Mutex::new(None),
            init_started: AtomicBool::new(false),
        })
    }

    /// Register an observer for session changes.
    pub fn register_observer(&self, observer: Arc<dyn StoreObserver>) {
        self.observers.register(observer);
    }

    /// Subscribe to the provider's auth-state stream and resolve once
    /// the first state has been applied. Idempotent: later calls return
    /// immediately without re-subscribing.
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        if self.init_started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        *self.init_tx.lock() = Some(tx);

        let weak = Arc::downgrade(self);
        let sub = self.identity.subscribe_auth_state(Arc::new(move |identity| {
            let Some(session) = weak.upgrade() else { return };
            let seq = session.auth_seq.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(async move {
                session.handle_auth_change(identity, seq).await;
            });
        }));
        *self.auth_sub.lock() = Some(sub);

        rx.await
            .map_err(|_| MurmurError::internal("initialization signal dropped"))
    }

    /// Create an email/password account and its profile document.
    ///
    /// # Errors
    /// `Validation` for empty fields, `Network` when connectivity is
    /// absent, and provider codes (`email-in-use`, `weak-password`)
    /// verbatim.
    pub async fn register(&self, email: &str, password: &str, name: &str) -> Result<()> {
        if email.trim().is_empty() || password.is_empty() || name.trim().is_empty() {
            return Err(MurmurError::validation(
                "email, password, and name are all required",
            ));
        }
        if !self.identity.is_online() {
            return Err(self.record_error(MurmurError::network("no connectivity")));
        }

        let _guard = self.ops.lock().await;
        let identity = match self.identity.sign_up(email.trim(), password).await {
            Ok(identity) => identity,
            Err(err) => return Err(self.record_error(err)),
        };

        let now = self.clock.now_ms();
        let name = name.trim();
        let mut user = User::new(
            identity.uid,
            name,
            email.trim(),
            User::default_avatar(name),
            now,
        );
        user.profile.joined = joined_label(now);
        if let Err(err) = self.gateway.create_user_profile(user.clone()).await {
            return Err(self.record_error(err));
        }

        self.remember_session(identity.uid);
        self.publish_user(Some(user));
        Ok(())
    }

    /// Authenticate an email/password credential.
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(MurmurError::validation("email and password are required"));
        }
        let _guard = self.ops.lock().await;
        let identity = match self.identity.sign_in(email.trim(), password).await {
            Ok(identity) => identity,
            Err(err) => return Err(self.record_error(err)),
        };
        let user = match self.resolve_identity(&identity).await {
            Ok(user) => user,
            Err(err) => return Err(self.record_error(err)),
        };
        self.remember_session(identity.uid);
        self.publish_user(Some(user));
        Ok(())
    }

    /// Authenticate through the federated provider flow, creating a
    /// profile document on first login.
    pub async fn login_federated(&self) -> Result<()> {
        let _guard = self.ops.lock().await;
        let identity = match self.identity.sign_in_federated().await {
            Ok(identity) => identity,
            Err(err) => return Err(self.record_error(err)),
        };
        let user = match self.resolve_identity(&identity).await {
            Ok(user) => user,
            Err(err) => return Err(self.record_error(err)),
        };
        self.remember_session(identity.uid);
        self.publish_user(Some(user));
        Ok(())
    }

    /// Sign out and clear local identity. Idempotent.
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.ops.lock().await;
        self.identity.sign_out().await?;
        if let Err(err) = self.hint.forget() {
            warn!(error = %err, "failed to clear session hint");
        }
        self.publish_user(None);
        Ok(())
    }

    /// Merge a partial update into the current user's profile, remote
    /// first, then local state.
    ///
    /// # Errors
    /// `Unauthorized` when there is no session or `target` is another
    /// user's id.
    pub async fn update_profile(&self, target: UserId, patch: UserPatch) -> Result<()> {
        let current = self
            .current_user()
            .ok_or_else(|| MurmurError::unauthorized("no active session"))?;
        if current.id != target {
            return Err(MurmurError::unauthorized(
                "cannot update another user's profile",
            ));
        }

        let _guard = self.ops.lock().await;
        if let Err(err) = self.gateway.update_user_profile(target, patch.clone()).await {
            return Err(self.record_error(err));
        }

        let now = self.clock.now_ms();
        {
            let mut state = self.state.lock();
            if let Some(user) = state.user.as_mut() {
                user.apply(patch, now);
            }
        }
        self.observers.notify(StateChange::Session);
        Ok(())
    }

    /// Current merged identity, `None` when signed out.
    #[must_use]
    pub fn current_user(&self) -> Option<User> {
        self.state.lock().user.clone()
    }

    /// Whether a session is active.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.lock().user.is_some()
    }

    /// Whether the first auth-state resolution has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    /// Whether a prior session was remembered across restarts.
    ///
    /// A hint only short-circuits the login screen; the provider still
    /// decides whether a real session exists.
    #[must_use]
    pub fn has_session_hint(&self) -> bool {
        self.hint.has_session()
    }

    /// Snapshot of the session slice.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.lock().clone()
    }

    /// Apply one auth-state delivery. Serialized behind `ops`; deliveries
    /// superseded by a newer one drop out instead of applying stale state.
    async fn handle_auth_change(&self, identity: Option<AuthIdentity>, seq: u64) {
        let _guard = self.ops.lock().await;
        if seq != self.auth_seq.load(Ordering::SeqCst) {
            debug!(seq, "auth-state delivery superseded");
            return;
        }
        self.set_loading(true);

        match identity {
            Some(identity) => match self.resolve_identity(&identity).await {
                Ok(user) => self.publish_user(Some(user)),
                Err(err) => {
                    warn!(uid = %identity.uid, error = %err, "profile resolution failed");
                    self.publish_user(None);
                    self.record_error(err);
                }
            },
            None => self.publish_user(None),
        }

        {
            let mut state = self.state.lock();
            state.loading = false;
            state.initialized = true;
        }
        if let Some(tx) = self.init_tx.lock().take() {
            let _ = tx.send(());
        }
        self.observers.notify(StateChange::Session);
    }

    /// Fetch the profile document matching a native identity, creating
    /// one with default fields when absent.
    async fn resolve_identity(&self, identity: &AuthIdentity) -> Result<User> {
        match self.gateway.get_user_profile(identity.uid).await {
            Ok(user) => Ok(user),
            Err(MurmurError::NotFound { .. }) => {
                let name = identity
                    .display_name
                    .clone()
                    .unwrap_or_else(|| local_part(&identity.email));
                let avatar = identity
                    .avatar
                    .clone()
                    .unwrap_or_else(|| User::default_avatar(&name));
                let now = self.clock.now_ms();
                let mut user = User::new(identity.uid, name, identity.email.clone(), avatar, now);
                user.profile.joined = joined_label(now);
                self.gateway.create_user_profile(user.clone()).await?;
                debug!(uid = %identity.uid, "created default profile for new identity");
                Ok(user)
            }
            Err(err) => Err(err),
        }
    }

    fn publish_user(&self, user: Option<User>) {
        {
            let mut state = self.state.lock();
            state.user = user;
            state.loading = false;
            state.last_error = None;
        }
        self.observers.notify(StateChange::Session);
    }

    fn remember_session(&self, uid: UserId) {
        if let Err(err) = self.hint.remember(uid) {
            warn!(error = %err, "failed to persist session hint");
        }
    }

    fn record_error(&self, err: MurmurError) -> MurmurError {
        self.state.lock().last_error = Some(err.clone());
        self.observers.notify(StateChange::Session);
        err
    }

    fn set_loading(&self, loading: bool) {
        self.state.lock().loading = loading;
    }
}

fn joined_label(now_ms: u64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(now_ms as i64)
        .map(|at| at.format("%B %Y").to_string())
        .unwrap_or_default()
}

fn local_part(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}
