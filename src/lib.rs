//! Chat Sync - conversation synchronization for a REST chat backend
//!
//! This library provides the client-side core of a chat application: it merges
//! contacts and groups into a single conversation list, loads and paginates
//! message history, acknowledges inbound messages and sends text or file
//! messages through an injected [`api::ChatApi`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod model;
pub mod session;
pub mod sync;

/// Result type alias for Chat Sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Chat Sync operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The backend rejected the bearer token (401/403)
    #[error("Session expired (HTTP {status})")]
    AuthExpired {
        /// HTTP status returned by the backend
        status: u16,
    },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("{message}")]
    ServerRejected {
        /// HTTP status returned by the backend
        status: u16,
        /// Error text reported by the backend
        message: String,
    },

    /// A response body could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Input rejected before any request was made
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An operation ran before the state it depends on was available
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Session token storage error
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the caller should drop the session and return to login
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired { .. })
    }

    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::AuthExpired { status } | Error::ServerRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Initialize logging for the Chat Sync library
///
/// Honours `RUST_LOG`; falls back to `info` for this crate.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("chat_sync=info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests;
