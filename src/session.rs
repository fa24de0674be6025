//! Bearer token storage
//!
//! The HTTP client never reads ambient storage directly; it asks an injected
//! [`SessionProvider`] for the token and tells it to forget the token when
//! the backend answers 401/403.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Access to the bearer token of the current session
pub trait SessionProvider: Send + Sync {
    /// Current token, if logged in
    fn token(&self) -> Option<String>;

    /// Replace the token
    fn set_token(&self, token: String) -> Result<()>;

    /// Forget the token
    fn clear(&self) -> Result<()>;

    /// Whether a token is present
    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// Session kept in memory only
#[derive(Debug, Default)]
pub struct MemorySession {
    token: RwLock<Option<String>>,
}

impl MemorySession {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl SessionProvider for MemorySession {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: String) -> Result<()> {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    token: Option<String>,
}

/// Session persisted to a JSON file, written through on every change
#[derive(Debug)]
pub struct FileSession {
    path: PathBuf,
    token: RwLock<Option<String>>,
}

impl FileSession {
    /// Load the session file; a missing or empty file means "logged out"
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let token = if path.exists() {
            let data = std::fs::read_to_string(&path)
                .map_err(|e| Error::Session(format!("Failed to read session: {}", e)))?;
            if data.trim().is_empty() {
                None
            } else {
                serde_json::from_str::<SessionFile>(&data)
                    .map_err(|e| Error::Session(format!("Failed to parse session: {}", e)))?
                    .token
            }
        } else {
            None
        };

        Ok(Self {
            path,
            token: RwLock::new(token),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, token: Option<String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Session(format!("Failed to create session directory: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(&SessionFile { token })?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::Session(format!("Failed to write session: {}", e)))?;
        Ok(())
    }
}

impl SessionProvider for FileSession {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_token(&self, token: String) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.persist(Some(token.clone()))?;
        *guard = Some(token);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
        self.persist(None)
    }
}
