//! # Data model
//!
//! Plain owned types shared by the gateway and the client stores. These
//! are serde-friendly and carry no framework reactivity; change
//! propagation is the store layer's concern.

pub mod conversation;
pub mod message;
pub mod user;

pub use conversation::{Conversation, ConversationKind, LastMessage};
pub use message::{Message, MessageStatus};
pub use user::{Presence, ProfilePatch, User, UserPatch, UserProfile};
