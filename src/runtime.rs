//! Turn orchestration
//!
//! One turn is load, dispatch, drive and save under a per-conversation lock.
//! Nothing is written unless the whole turn succeeded, so a failed turn
//! leaves the previous snapshot and data bags in place.

use crate::activity::{Activity, ConversationKey, Reply, Scope};
use crate::dialog::{DialogContext, DialogRegistry, RootFactory};
use crate::error::TurnError;
use crate::scorable::Dispatcher;
use crate::store::Storage;
use crate::task::{DialogTask, TurnStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// What the transport gets back for one incoming activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub replies: Vec<Reply>,
    pub status: TurnStatus,
}

/// Runs turns for every conversation backed by one store
pub struct ConversationManager<S> {
    store: S,
    registry: Arc<DialogRegistry>,
    root: RootFactory,
    dispatcher: Arc<Dispatcher>,
    max_steps: usize,
    locks: RwLock<HashMap<ConversationKey, Arc<Mutex<()>>>>,
}

impl<S: Storage + Clone> ConversationManager<S> {
    pub fn new(
        store: S,
        registry: Arc<DialogRegistry>,
        root: RootFactory,
        dispatcher: Arc<Dispatcher>,
        max_steps: usize,
    ) -> Self {
        Self {
            store,
            registry,
            root,
            dispatcher,
            max_steps,
            locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn lock_for(&self, key: &ConversationKey) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(key) {
            return lock.clone();
        }
        self.locks
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drop locks nobody is holding or waiting on
    async fn release(&self, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .write()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    fn task(&self, key: &ConversationKey) -> DialogTask<S> {
        DialogTask::new(
            key.clone(),
            self.store.clone(),
            self.registry.clone(),
            self.root.clone(),
            self.max_steps,
        )
    }

    /// Run one turn for `key`. Turns for the same conversation are serialized.
    pub async fn handle(&self, key: &ConversationKey, item: Activity) -> Result<TurnOutcome, TurnError> {
        let lock = self.lock_for(key).await;
        let result = {
            let _turn = lock.lock().await;
            self.run_turn(key, item).await
        };
        self.release(lock).await;

        if let Err(e) = &result {
            tracing::error!(conversation = %key, error = %e, "Turn failed, nothing saved");
        }
        result
    }

    async fn run_turn(&self, key: &ConversationKey, item: Activity) -> Result<TurnOutcome, TurnError> {
        let data = self.store.load_data(key).await?;
        let mut task = self.task(key);
        let resumed = task.try_load().await?;
        tracing::debug!(conversation = %key, resumed, item = %item.id, "Turn started");

        let mut cx = DialogContext::new(key.clone(), data);
        let status = self.dispatcher.dispatch(&mut task, &mut cx, item)?;
        let (data, replies) = cx.into_parts();

        // Stack first: a bag is never committed for a turn whose stack was lost
        task.save().await?;
        self.store.save_data(key, &data).await?;

        tracing::info!(conversation = %key, ?status, replies = replies.len(), "Turn completed");
        Ok(TurnOutcome { replies, status })
    }

    /// Forget the dialog stack and the private conversation data of `key`
    pub async fn reset(&self, key: &ConversationKey) -> Result<(), TurnError> {
        let lock = self.lock_for(key).await;
        let result = {
            let _turn = lock.lock().await;
            self.reset_locked(key).await
        };
        self.release(lock).await;
        result
    }

    async fn reset_locked(&self, key: &ConversationKey) -> Result<(), TurnError> {
        self.task(key).reset().await?;
        let mut data = self.store.load_data(key).await?;
        data.clear(Scope::PrivateConversation);
        self.store.save_data(key, &data).await?;
        tracing::info!(conversation = %key, "Conversation reset");
        Ok(())
    }
}
