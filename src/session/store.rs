// src/session/store.rs — Session persistence
//
// The session is stored as JSON next to the config (session.json). Writes
// are atomic (temp file + rename) and the file is chmod 600 on Unix, since
// it holds live authentication cookies.

use std::path::{Path, PathBuf};

use super::{Session, SessionOrigin};
use crate::infra::atomic::write_atomic;
use crate::infra::errors::StoreError;
use crate::infra::paths;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(paths::session_file_path())
    }
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored session. `Ok(None)` when no file exists.
    pub fn load(&self) -> Result<Option<Session>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let mut session: Session = serde_json::from_str(&content)?;
        session.origin = SessionOrigin::Restored;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(session)?;
        write_atomic(&self.path, json.as_bytes(), true)?;
        tracing::debug!("Session saved to {}", self.path.display());
        Ok(())
    }

    /// Remove the stored session. Missing files are not an error.
    pub fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
