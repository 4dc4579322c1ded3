//! # murmur-core
//!
//! Shared foundation for the murmur chat client: identifier newtypes, the
//! chat data model, the unified error type, and the clock seam. This crate
//! does no I/O; everything here is plain owned state.

pub mod errors;
pub mod identifiers;
pub mod model;
pub mod time;

pub use errors::{AuthErrorCode, MurmurError, Result};
pub use identifiers::{ConversationId, MessageId, UserId};
pub use model::{
    Conversation, ConversationKind, LastMessage, Message, MessageStatus, Presence, ProfilePatch,
    User, UserPatch, UserProfile,
};
pub use time::{Clock, ManualClock, SystemClock};
