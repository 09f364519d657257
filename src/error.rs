//! Error types for arbiter configuration and session plumbing
//!
//! Classification itself never fails; these cover bad configuration and
//! talking to a session whose task has already exited.

use std::path::PathBuf;

/// Errors raised while building word sets or loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("word list entry {entry:?} normalizes to {tokens} tokens, entries must be single words")]
    MultiWordEntry { entry: String, tokens: usize },

    #[error("resume timeout must be greater than zero")]
    ZeroTimeout,

    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Errors surfaced to the host driving a session
#[derive(Debug, thiserror::Error)]
pub enum ArbiterError {
    #[error("session {0:?} is closed")]
    SessionClosed(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for arbiter operations
pub type Result<T> = std::result::Result<T, ArbiterError>;
