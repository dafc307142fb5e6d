//! Dialog Fiber - resumable conversational dialogs
//!
//! Multi-turn conversations written as nested dialog calls. The call stack
//! (the "fiber") is snapshotted after every turn and resumed on the next
//! message, and an interrupt dispatcher lets stack triggers and global
//! handlers claim a message ahead of the waiting dialog.

pub mod activity;
pub mod api;
pub mod config;
pub mod demo;
pub mod dialog;
pub mod error;
pub mod fiber;
pub mod runtime;
pub mod scorable;
pub mod store;
pub mod task;

#[cfg(test)]
pub mod testing;

pub use activity::{Activity, ConversationKey, Reply, Scope};
pub use config::EngineConfig;
pub use dialog::{Awaited, BoxedDialog, Dialog, DialogContext, DialogRegistry, DialogResult, Next};
pub use error::{DialogError, DialogErrorKind, TurnError};
pub use fiber::{Fiber, Settled};
pub use runtime::{ConversationManager, TurnOutcome};
pub use scorable::{Dispatcher, Intercept, Scorable, ScoreTraits, Trigger};
pub use task::{DialogTask, TurnStatus};
