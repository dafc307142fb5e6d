//! Error types
//!
//! `DialogError` is data: it is stored in `Failed` waits, serialized with the
//! stack and handed to parent continuations. Everything else is engine-level
//! and aborts the turn.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dialog-level failure with classification
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct DialogError {
    pub kind: DialogErrorKind,
    pub message: String,
}

impl DialogError {
    pub fn new(kind: DialogErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(DialogErrorKind::Failed, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(DialogErrorKind::Cancelled, message)
    }

    pub fn too_many_attempts(message: impl Into<String>) -> Self {
        Self::new(DialogErrorKind::TooManyAttempts, message)
    }

    pub fn unexpected_input(message: impl Into<String>) -> Self {
        Self::new(DialogErrorKind::UnexpectedInput, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(DialogErrorKind::TypeMismatch, message)
    }

    pub fn serialization(err: &serde_json::Error) -> Self {
        Self::new(DialogErrorKind::Serialization, err.to_string())
    }
}

impl From<DataError> for DialogError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::TypeMismatch { .. } => Self::type_mismatch(err.to_string()),
            DataError::Serialization(e) => Self::serialization(&e),
        }
    }
}

/// Failure classification carried across the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogErrorKind {
    /// Generic failure raised by dialog code
    Failed,
    /// Dialog was cancelled by the user or a handler
    Cancelled,
    /// A prompt ran out of retries
    TooManyAttempts,
    /// The continuation received an input it cannot handle
    UnexpectedInput,
    /// A resumed value did not have the expected type
    TypeMismatch,
    /// Dialog state or a resume point could not be (de)serialized
    Serialization,
}

impl std::fmt::Display for DialogErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::TooManyAttempts => "too many attempts",
            Self::UnexpectedInput => "unexpected input",
            Self::TypeMismatch => "type mismatch",
            Self::Serialization => "serialization",
        };
        f.write_str(name)
    }
}

/// Errors raised by the continuation stack itself
#[derive(Debug, Error)]
pub enum FiberError {
    #[error("Stack is empty, no frame to operate on")]
    EmptyStack,
    #[error("Unhandled input: no frame is waiting for an item")]
    UnhandledInput,
    #[error("Frame {frame} is not suspended (expected a resumable wait)")]
    NotSuspended { frame: usize },
    #[error("Frame index {frame} out of range for depth {depth}")]
    NoSuchFrame { frame: usize, depth: usize },
    #[error("Drive did not settle after {limit} steps")]
    DriveLimitExceeded { limit: usize },
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Scoring contract violations
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Scorable '{handler}' returned {score}, outside [{minimum}, {maximum}]")]
    OutOfBounds {
        handler: String,
        score: f64,
        minimum: f64,
        maximum: f64,
    },
    #[error("Scorable '{handler}' received prepared state of another handler")]
    StateMismatch { handler: String },
}

/// Snapshot codec failures; all of these mean "no usable prior state"
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Snapshot is truncated ({len} bytes)")]
    Truncated { len: usize },
    #[error("Snapshot magic mismatch")]
    BadMagic,
    #[error("Unsupported snapshot version {0}")]
    UnsupportedVersion(u32),
    #[error("Snapshot checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    Checksum { stored: u32, computed: u32 },
    #[error("Snapshot compression failed: {0}")]
    Compression(#[from] std::io::Error),
    #[error("Snapshot decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Unknown dialog kind in snapshot: {0}")]
    UnknownDialog(String),
}

/// Persistence backend failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Typed data bag failures
#[derive(Debug, Error)]
pub enum DataError {
    #[error("Value at '{key}' does not have the requested type: {source}")]
    TypeMismatch {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Value could not be serialized: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Turn-level failure; anything here aborts the turn without saving
#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Fiber(#[from] FiberError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Handler '{handler}' failed: {error}")]
    Handler { handler: String, error: DialogError },
}
