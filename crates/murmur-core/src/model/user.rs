//! # User model
//!
//! Profile documents are created at registration, updated only by their
//! owner, and never deleted in-app.

use crate::identifiers::UserId;
use serde::{Deserialize, Serialize};

/// Presence status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Presence {
    /// User is connected
    Online,
    /// User is away
    #[default]
    Offline,
}

impl Presence {
    /// Whether the user is currently connected
    #[must_use]
    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Free-form profile fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserProfile {
    /// Short self-description
    pub bio: String,
    /// Location label
    pub location: String,
    /// Interest tags
    pub interests: Vec<String>,
    /// Human-readable join date label (e.g. "January 2024")
    pub joined: String,
}

/// A user profile document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier (matches the provider identity uid)
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Contact email
    pub email: String,
    /// Avatar URI
    pub avatar: String,
    /// Presence status
    pub presence: Presence,
    /// Free-form profile fields
    pub profile: UserProfile,
    /// Creation timestamp (ms since epoch)
    pub created_at_ms: u64,
    /// Last-update timestamp (ms since epoch)
    pub updated_at_ms: u64,
}

impl User {
    /// Create a profile with default presence and empty profile fields.
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        avatar: impl Into<String>,
        created_at_ms: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            avatar: avatar.into(),
            presence: Presence::Online,
            profile: UserProfile::default(),
            created_at_ms,
            updated_at_ms: created_at_ms,
        }
    }

    /// Generated avatar URI seeded from a display name.
    #[must_use]
    pub fn default_avatar(name: &str) -> String {
        format!(
            "https://api.dicebear.com/7.x/avataaars/svg?seed={}",
            name.replace(' ', "%20")
        )
    }

    /// Merge a partial update into this profile.
    ///
    /// `Some` fields win; nested profile fields merge field-wise. The
    /// caller supplies the new update timestamp.
    pub fn apply(&mut self, patch: UserPatch, updated_at_ms: u64) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = avatar;
        }
        if let Some(presence) = patch.presence {
            self.presence = presence;
        }
        if let Some(profile) = patch.profile {
            if let Some(bio) = profile.bio {
                self.profile.bio = bio;
            }
            if let Some(location) = profile.location {
                self.profile.location = location;
            }
            if let Some(interests) = profile.interests {
                self.profile.interests = interests;
            }
            if let Some(joined) = profile.joined {
                self.profile.joined = joined;
            }
        }
        self.updated_at_ms = updated_at_ms;
    }
}

/// Partial update for nested profile fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProfilePatch {
    /// New bio, when present
    pub bio: Option<String>,
    /// New location, when present
    pub location: Option<String>,
    /// New interest tags, when present
    pub interests: Option<Vec<String>>,
    /// New join label, when present
    pub joined: Option<String>,
}

/// Partial update for a user document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserPatch {
    /// New display name, when present
    pub name: Option<String>,
    /// New avatar URI, when present
    pub avatar: Option<String>,
    /// New presence, when present
    pub presence: Option<Presence>,
    /// Nested profile updates, when present
    pub profile: Option<ProfilePatch>,
}

impl UserPatch {
    /// A patch that only changes presence.
    #[must_use]
    pub fn presence(presence: Presence) -> Self {
        Self {
            presence: Some(presence),
            ..Self::default()
        }
    }
}
