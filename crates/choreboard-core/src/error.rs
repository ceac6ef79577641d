//! Core error types for choreboard-core.
//!
//! Command-surface operations return [`CoreError`] synchronously. Background
//! sweeps never surface these; they log and move on to the next record.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of entity an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Kid,
    Parent,
    Chore,
    Badge,
    Achievement,
    Challenge,
    Reward,
    Bonus,
    Penalty,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Kid => "kid",
            EntityKind::Parent => "parent",
            EntityKind::Chore => "chore",
            EntityKind::Badge => "badge",
            EntityKind::Achievement => "achievement",
            EntityKind::Challenge => "challenge",
            EntityKind::Reward => "reward",
            EntityKind::Bonus => "bonus",
            EntityKind::Penalty => "penalty",
        };
        f.write_str(name)
    }
}

/// Why a chore transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidStateReason {
    /// A claim is already waiting for approval and the chore allows only one.
    PendingClaim,
    /// The chore was already approved in the current approval period.
    AlreadyApproved,
    /// Another kid claimed a shared-first chore.
    ClaimedByOther,
    /// Approval attempted for a kid whose shared-first chore was done by someone else.
    CompletedByOther,
    /// Disapproval attempted with no claim waiting for a decision.
    NoPendingClaim,
}

impl fmt::Display for InvalidStateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InvalidStateReason::PendingClaim => "a claim is already pending approval",
            InvalidStateReason::AlreadyApproved => "already approved in the current period",
            InvalidStateReason::ClaimedByOther => "already claimed by another kid",
            InvalidStateReason::CompletedByOther => "completed by another kid",
            InvalidStateReason::NoPendingClaim => "no claim is pending approval",
        };
        f.write_str(text)
    }
}

/// Core error type for choreboard-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Identifier did not resolve
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Kid is not assigned to the target entity
    #[error("kid {kid} is not assigned to {kind} {id}")]
    NotAssigned {
        kid: String,
        kind: EntityKind,
        id: String,
    },

    /// Chore transition refused in the current state
    #[error("chore {chore} for kid {kid}: {reason}")]
    InvalidState {
        kid: String,
        chore: String,
        reason: InvalidStateReason,
    },

    /// Reward cost exceeds the kid's balance
    #[error("kid {kid} has {available} points, {required} required")]
    InsufficientBalance {
        kid: String,
        required: f64,
        available: f64,
    },

    /// Recurrence is inconsistent with the due-date configuration
    #[error("invalid frequency for chore {chore}: {message}")]
    InvalidFrequency { chore: String, message: String },

    /// A required field is absent
    #[error("{entity} is missing required field '{field}'")]
    MissingField { entity: String, field: &'static str },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn not_assigned(kid: impl Into<String>, kind: EntityKind, id: impl Into<String>) -> Self {
        CoreError::NotAssigned {
            kid: kid.into(),
            kind,
            id: id.into(),
        }
    }

    pub fn invalid_state(
        kid: impl Into<String>,
        chore: impl Into<String>,
        reason: InvalidStateReason,
    ) -> Self {
        CoreError::InvalidState {
            kid: kid.into(),
            chore: chore.into(),
            reason,
        }
    }

    /// The refusal reason, if this is an `InvalidState` error.
    pub fn invalid_state_reason(&self) -> Option<InvalidStateReason> {
        match self {
            CoreError::InvalidState { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
