//! Persisted session hint
//!
//! One flag file survives restarts so the UI can skip straight past the
//! login screen when a session existed last time. It is not a security
//! boundary: the provider still decides whether a session is actually
//! valid, and nothing here is treated as a credential.

use murmur_core::{Result, UserId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
struct HintFile {
    uid: UserId,
}

/// The persisted auth-token-equivalent flag.
#[derive(Debug, Clone)]
pub struct SessionHint {
    path: PathBuf,
}

impl SessionHint {
    /// Hint stored at `path` (parent directories are created on write).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether a prior session was remembered.
    #[must_use]
    pub fn has_session(&self) -> bool {
        self.remembered_uid().is_some()
    }

    /// The remembered uid, when the hint file exists and parses.
    #[must_use]
    pub fn remembered_uid(&self) -> Option<UserId> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str::<HintFile>(&raw).ok().map(|h| h.uid)
    }

    /// Remember a session.
    pub fn remember(&self, uid: UserId) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string(&HintFile { uid })
            .map_err(|e| murmur_core::MurmurError::internal(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }

    /// Forget any remembered session. Idempotent.
    pub fn forget(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let hint = SessionHint::new(dir.path().join("session.json"));
        assert!(!hint.has_session());

        let uid = UserId::new();
        hint.remember(uid).unwrap();
        assert_eq!(hint.remembered_uid(), Some(uid));

        hint.forget().unwrap();
        assert!(!hint.has_session());
        // forgetting twice is fine
        hint.forget().unwrap();
    }

    #[test]
    fn test_garbage_file_reads_as_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        let hint = SessionHint::new(path);
        assert!(!hint.has_session());
    }
}
