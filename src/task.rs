//! Conversation engine
//!
//! Binds one fiber to one conversation. Loading is resilient: a blob that
//! fails to decode for any reason is logged, deleted and treated as a brand
//! new conversation.

pub mod codec;

use crate::activity::{Activity, ConversationKey};
use crate::dialog::{BoxedDialog, DialogContext, DialogRegistry, RootFactory};
use crate::error::{DialogError, FiberError, SnapshotError, StoreError, TurnError};
use crate::fiber::{Fiber, Settled};
use crate::scorable::Trigger;
use crate::store::SnapshotStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Where the conversation stands after a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TurnStatus {
    /// A dialog is waiting for the next message
    Waiting { depth: usize },
    /// The root dialog finished; the next message starts over
    Completed { value: Value },
    /// The root dialog failed; the next message starts over
    Failed { error: DialogError },
    /// A handler discarded the conversation
    Restarted,
}

/// One conversation's stack and the store it persists to
pub struct DialogTask<S> {
    key: ConversationKey,
    store: S,
    registry: Arc<DialogRegistry>,
    root: RootFactory,
    max_steps: usize,
    fiber: Option<Fiber>,
}

impl<S: SnapshotStore> DialogTask<S> {
    pub fn new(
        key: ConversationKey,
        store: S,
        registry: Arc<DialogRegistry>,
        root: RootFactory,
        max_steps: usize,
    ) -> Self {
        Self {
            key,
            store,
            registry,
            root,
            max_steps,
            fiber: None,
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn fiber(&self) -> Option<&Fiber> {
        self.fiber.as_ref()
    }

    /// Load the stored stack. `Ok(false)` means "treat as new conversation";
    /// only a failing store is an error.
    pub async fn try_load(&mut self) -> Result<bool, StoreError> {
        let Some(blob) = self.store.try_load(&self.key).await? else {
            self.fiber = None;
            return Ok(false);
        };

        match self.restore(&blob) {
            Ok(fiber) => {
                tracing::debug!(conversation = %self.key, depth = fiber.depth(), "Stack loaded");
                self.fiber = Some(fiber);
                Ok(true)
            }
            Err(e) => {
                tracing::warn!(
                    conversation = %self.key,
                    error = %e,
                    bytes = blob.len(),
                    "Discarding unreadable snapshot, starting a new conversation"
                );
                self.fiber = None;
                self.store.delete(&self.key).await?;
                Ok(false)
            }
        }
    }

    fn restore(&self, blob: &[u8]) -> Result<Fiber, SnapshotError> {
        let snapshot = codec::decode(blob)?;
        Fiber::restore(snapshot, &self.registry, self.max_steps)
    }

    /// The live stack, seeding and starting a fresh root when there is none
    fn ensure_started(&mut self, cx: &mut DialogContext) -> Result<&mut Fiber, FiberError> {
        let fresh = self.fiber.as_ref().map_or(true, Fiber::is_empty);
        if fresh {
            tracing::info!(conversation = %self.key, "Starting new conversation");
            let mut fiber = Fiber::with_root((self.root)(), self.max_steps);
            let settled = fiber.drive(cx)?;
            self.fiber = Some(fiber);
            if settled != Settled::Waiting {
                // Root finished without ever waiting for input
                tracing::warn!(conversation = %self.key, ?settled, "Root dialog ended during start");
                return Err(FiberError::UnhandledInput);
            }
        }
        self.fiber.as_mut().ok_or(FiberError::EmptyStack)
    }

    /// Triggers offered by the live stack, innermost frame first
    pub fn triggers(&mut self, cx: &mut DialogContext) -> Result<Vec<(usize, Trigger<Value>)>, FiberError> {
        Ok(self.ensure_started(cx)?.triggers())
    }

    /// Deliver an item to the waiting top frame and drive
    pub fn post(&mut self, cx: &mut DialogContext, item: Activity) -> Result<TurnStatus, FiberError> {
        let fiber = self.ensure_started(cx)?;
        fiber.post(item)?;
        let settled = fiber.drive(cx)?;
        Ok(self.status(settled))
    }

    /// Run `dialog` above the current top, leaving the top's wait in place
    pub fn interrupt(&mut self, cx: &mut DialogContext, dialog: BoxedDialog) -> Result<TurnStatus, FiberError> {
        let fiber = self.ensure_started(cx)?;
        fiber.interrupt(dialog);
        let settled = fiber.drive(cx)?;
        Ok(self.status(settled))
    }

    /// Unwind to `frame` and resume it at `method` with `item`
    pub fn resume_frame(
        &mut self,
        cx: &mut DialogContext,
        frame: usize,
        method: Value,
        item: Activity,
    ) -> Result<TurnStatus, FiberError> {
        let fiber = self.ensure_started(cx)?;
        fiber.unwind_to(frame, method, item)?;
        let settled = fiber.drive(cx)?;
        Ok(self.status(settled))
    }

    /// Status of the stack as it is, for handlers that left it untouched
    pub fn current_status(&self) -> TurnStatus {
        TurnStatus::Waiting {
            depth: self.fiber.as_ref().map_or(0, Fiber::depth),
        }
    }

    /// Drop the in-memory stack; `save` then deletes the stored one
    pub fn restart(&mut self) {
        tracing::info!(conversation = %self.key, "Conversation restarted");
        self.fiber = None;
    }

    fn status(&self, settled: Settled) -> TurnStatus {
        match settled {
            Settled::Waiting => self.current_status(),
            Settled::Completed(value) => TurnStatus::Completed { value },
            Settled::Failed(error) => TurnStatus::Failed { error },
        }
    }

    /// Persist the stack. An ended or discarded conversation deletes the
    /// stored snapshot instead.
    pub async fn save(&self) -> Result<(), TurnError> {
        match self.fiber.as_ref().filter(|fiber| !fiber.is_empty()) {
            Some(fiber) => {
                let blob = codec::encode(&fiber.snapshot()?)?;
                self.store.save(&self.key, &blob).await?;
                tracing::debug!(conversation = %self.key, bytes = blob.len(), "Stack saved");
            }
            None => self.store.delete(&self.key).await?,
        }
        Ok(())
    }

    /// Forget the conversation, in memory and in the store
    pub async fn reset(&mut self) -> Result<(), StoreError> {
        self.fiber = None;
        self.store.delete(&self.key).await
    }
}
