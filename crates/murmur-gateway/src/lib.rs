//! # murmur-gateway
//!
//! The seam between the murmur client and its hosted backend: the
//! document-store and identity-provider contracts, the subscription
//! handle and snapshot types they share, and an in-memory reference
//! backend implementing both contracts for tests and demos.

pub mod memory;
pub mod snapshot;
pub mod subscription;
pub mod traits;

pub use memory::MemoryBackend;
pub use snapshot::{Snapshot, Watcher};
pub use subscription::Subscription;
pub use traits::{
    AuthIdentity, AuthProvider, AuthWatcher, DocumentGateway, FirstMessage, IdentityProvider,
};
