//! Unified error system for the murmur client
//!
//! One error type covers every operation in the workspace. Nothing in the
//! public contract panics or throws across a boundary; fallible operations
//! return `Result<T, MurmurError>` and subscription callbacks receive the
//! error inside their snapshot payload.

use serde::{Deserialize, Serialize};

/// Error codes surfaced by the identity provider.
///
/// These pass through to the caller verbatim; the session layer never
/// remaps or retries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthErrorCode {
    /// Email/password pair rejected
    InvalidCredential,
    /// Registration attempted with an email that already has an identity
    EmailInUse,
    /// Password rejected by the provider's strength policy
    WeakPassword,
    /// Provider unreachable
    ProviderUnavailable,
}

impl AuthErrorCode {
    /// The provider's wire-format code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid-credential",
            Self::EmailInUse => "email-in-use",
            Self::WeakPassword => "weak-password",
            Self::ProviderUnavailable => "provider-unavailable",
        }
    }
}

impl std::fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unified error type for all murmur operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum MurmurError {
    /// A required field is missing or malformed
    #[error("Validation: {message}")]
    Validation {
        /// Error message describing the invalid input
        message: String,
    },

    /// The identity provider rejected the operation
    #[error("Auth ({code}): {message}")]
    Auth {
        /// Provider error code, surfaced verbatim
        code: AuthErrorCode,
        /// Error message from the provider
        message: String,
    },

    /// Acting on a resource without the required participant or
    /// ownership relation
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message describing the missing relation
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Connectivity absent or a backend call was rejected
    #[error("Network error: {message}")]
    Network {
        /// Error message describing the network issue
        message: String,
    },

    /// Operating on a store without an active session or subscription
    #[error("State error: {message}")]
    State {
        /// Error message describing the state violation
        message: String,
    },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl MurmurError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an auth error carrying a provider code
    pub fn auth(code: AuthErrorCode, message: impl Into<String>) -> Self {
        Self::Auth {
            code,
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether the error is likely transient and worth a caller-driven retry.
    ///
    /// Nothing in this workspace retries automatically; the UI layer owns
    /// retry policy.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::NotFound { .. })
    }

    /// The provider code, when this is an auth error.
    #[must_use]
    pub fn auth_code(&self) -> Option<AuthErrorCode> {
        match self {
            Self::Auth { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Standard Result type for murmur operations
pub type Result<T> = std::result::Result<T, MurmurError>;

impl From<std::io::Error> for MurmurError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}
