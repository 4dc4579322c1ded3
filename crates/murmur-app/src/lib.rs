//! # murmur-app
//!
//! Portable headless chat client core. Frontends bind to two stateful
//! managers — [`AuthSession`] for identity and [`ChatStore`] for the
//! conversation view — plus a handful of presentation helpers. State is
//! plain owned data behind accessors; change propagation is an explicit
//! observer callback, not a framework reactivity primitive.
//!
//! Construct the managers once at process start and pass references to
//! consumers:
//!
//! ```ignore
//! let backend = Arc::new(MemoryBackend::new());
//! let session = AuthSession::new(
//!     backend.clone(),
//!     backend.clone(),
//!     Arc::new(SystemClock),
//!     SessionHint::new(data_dir.join("session.json")),
//! );
//! let store = ChatStore::new(backend, session.clone(), Arc::new(SystemClock));
//! session.initialize().await?;
//! ```

pub mod companion;
pub mod hint;
pub mod notify;
pub mod observer;
pub mod session;
pub mod store;
pub mod typing;

pub use companion::{CompanionResponder, COMPANION_REPLIES, DEFAULT_TYPING_DELAY};
pub use hint::SessionHint;
pub use notify::{Notification, NotificationCenter, NotificationLevel, DEFAULT_TIMEOUT};
pub use observer::{Observers, StateChange, StoreObserver};
pub use session::{AuthSession, SessionState};
pub use store::ChatStore;
pub use typing::{TypingIndicator, TYPING_TTL};
