//! Suspension points

use crate::dialog::Awaited;
use crate::error::DialogError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a frame picks up when its wait is satisfied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Continuation {
    /// The dialog's entry point
    Start,
    /// A serialized resume point of the owning dialog
    Resume { method: Value },
}

impl Continuation {
    pub fn resume(method: Value) -> Self {
        Continuation::Resume { method }
    }
}

/// State of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Wait {
    /// Suspended at `continuation`. `ready` holds an input that has been
    /// delivered but not yet consumed by `drive`.
    Resumable {
        continuation: Continuation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ready: Option<Awaited>,
    },
    /// Finished; the parent receives `value`
    Done { value: Value },
    /// Failed; the parent receives `error`
    Failed { error: DialogError },
}

impl Wait {
    /// Suspended, waiting for an external item
    pub fn suspended(continuation: Continuation) -> Self {
        Wait::Resumable {
            continuation,
            ready: None,
        }
    }

    /// Entry point armed to run on the next drive step
    pub fn entry() -> Self {
        Wait::Resumable {
            continuation: Continuation::Start,
            ready: Some(Awaited::Start),
        }
    }

    /// Resumable with nothing delivered yet
    pub fn is_suspended(&self) -> bool {
        matches!(self, Wait::Resumable { ready: None, .. })
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Wait::Done { .. } | Wait::Failed { .. })
    }

    /// Deliver an input to a suspended wait. Returns false (and drops the
    /// input) when the wait is not suspended.
    pub(crate) fn arm(&mut self, input: Awaited) -> bool {
        match self {
            Wait::Resumable { ready, .. } if ready.is_none() => {
                *ready = Some(input);
                true
            }
            _ => false,
        }
    }

    /// Take the delivered input together with the continuation to run.
    /// The continuation is consumed: the caller must replace this wait.
    pub(crate) fn take_input(&mut self) -> Option<(Continuation, Awaited)> {
        match self {
            Wait::Resumable {
                continuation,
                ready,
            } => ready.take().map(|input| (continuation.clone(), input)),
            _ => None,
        }
    }

    /// Final outcome of a resolved wait
    pub(crate) fn into_outcome(self) -> Option<Result<Value, DialogError>> {
        match self {
            Wait::Done { value } => Some(Ok(value)),
            Wait::Failed { error } => Some(Err(error)),
            Wait::Resumable { .. } => None,
        }
    }
}
