//! Error types for the store, the platform boundary and the command pipeline.

use std::fmt;

use crate::moderation::policy::Action;

/// Persistence failure.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite rejected a statement or the database file is unusable.
    Sqlite(rusqlite::Error),
    /// A thread panicked while holding the connection.
    Poisoned,
    /// The store was closed at shutdown.
    Closed,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(e) => write!(f, "sqlite error: {}", e),
            Self::Poisoned => write!(f, "store connection lock poisoned"),
            Self::Closed => write!(f, "store is closed"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(e) => Some(e),
            Self::Poisoned | Self::Closed => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Sqlite(e)
    }
}

/// A chat platform call (send, restrict, ban, unban) failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError(pub String);

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PlatformError {}

/// Why a command was rejected.
#[derive(Debug)]
pub enum ModerationError {
    /// The command needs a target but was not sent as a reply.
    NoTarget,
    /// The actor lacks the role the action requires.
    Forbidden { action: Action },
    /// Arguments could not be parsed or make no sense for this target.
    InvalidArgument(String),
    /// The platform refused or failed an enforcement call.
    Platform(PlatformError),
    /// Persistence failed; the command was not applied.
    Store(StoreError),
}

impl fmt::Display for ModerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTarget => write!(f, "no target: command must reply to a user's message"),
            Self::Forbidden { action } => write!(f, "forbidden: {} requires admin", action.as_str()),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::Platform(e) => write!(f, "platform call failed: {}", e),
            Self::Store(e) => write!(f, "store failure: {}", e),
        }
    }
}

impl std::error::Error for ModerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Platform(e) => Some(e),
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for ModerationError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<PlatformError> for ModerationError {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}
