//! Per-turn capabilities handed to dialog and handler code

use crate::activity::{ConversationKey, Reply, Scope};
use crate::error::DialogError;
use crate::store::BotData;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Everything a dialog may touch during a turn.
///
/// Built fresh for each turn from the loaded data bag; replies accumulate in
/// the outbox and are returned to the transport when the turn ends.
#[derive(Debug)]
pub struct DialogContext {
    key: ConversationKey,
    data: BotData,
    outbox: Vec<Reply>,
}

impl DialogContext {
    pub fn new(key: ConversationKey, data: BotData) -> Self {
        Self {
            key,
            data,
            outbox: Vec::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Queue a message to the user
    pub fn post(&mut self, text: impl Into<String>) {
        self.outbox.push(Reply::text(text));
    }

    pub fn replies(&self) -> &[Reply] {
        &self.outbox
    }

    pub fn data(&self) -> &BotData {
        &self.data
    }


    /// Typed data bag read, failing the dialog on a type mismatch
    pub fn get<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, DialogError> {
        Ok(self.data.get(scope, key)?)
    }

    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        scope: Scope,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), DialogError> {
        Ok(self.data.set(scope, key, value)?)
    }

    /// Drop a value from the bag, returning what was stored
    pub fn remove(&mut self, scope: Scope, key: &str) -> Option<Value> {
        self.data.remove(scope, key)
    }

    /// Consume the context, yielding the data bag to persist and the replies
    pub fn into_parts(self) -> (BotData, Vec<Reply>) {
        (self.data, self.outbox)
    }
}
