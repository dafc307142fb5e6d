//! Persistence adapters and the scoped data bag
//!
//! The engine only needs two narrow contracts: an opaque blob per
//! conversation (the serialized stack) and three scoped key/value bags.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{Database, SqliteStore};

use crate::activity::{ConversationKey, Scope};
use crate::error::{DataError, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One scope's key/value pairs
pub type Bag = BTreeMap<String, Value>;

/// Opaque snapshot persistence keyed by conversation
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the stored blob, `None` when the conversation is new
    async fn try_load(&self, key: &ConversationKey) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the stored blob
    async fn save(&self, key: &ConversationKey, blob: &[u8]) -> Result<(), StoreError>;

    /// Forget the stored blob
    async fn delete(&self, key: &ConversationKey) -> Result<(), StoreError>;
}

/// Scoped data bag persistence
#[async_trait]
pub trait BotDataStore: Send + Sync {
    /// Load all three scopes for the key; missing scopes are empty
    async fn load_data(&self, key: &ConversationKey) -> Result<BotData, StoreError>;

    /// Persist all three scopes for the key
    async fn save_data(&self, key: &ConversationKey, data: &BotData) -> Result<(), StoreError>;
}

/// Combined storage trait for convenience
pub trait Storage: SnapshotStore + BotDataStore {}
impl<T: SnapshotStore + BotDataStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    async fn try_load(&self, key: &ConversationKey) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).try_load(key).await
    }

    async fn save(&self, key: &ConversationKey, blob: &[u8]) -> Result<(), StoreError> {
        (**self).save(key, blob).await
    }

    async fn delete(&self, key: &ConversationKey) -> Result<(), StoreError> {
        (**self).delete(key).await
    }
}

#[async_trait]
impl<T: BotDataStore + ?Sized> BotDataStore for Arc<T> {
    async fn load_data(&self, key: &ConversationKey) -> Result<BotData, StoreError> {
        (**self).load_data(key).await
    }

    async fn save_data(&self, key: &ConversationKey, data: &BotData) -> Result<(), StoreError> {
        (**self).save_data(key, data).await
    }
}

// ============================================================================
// Data Bag
// ============================================================================

/// The three scoped bags visible to dialogs during a turn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BotData {
    user: Bag,
    conversation: Bag,
    private: Bag,
}

impl BotData {
    pub fn new(user: Bag, conversation: Bag, private: Bag) -> Self {
        Self {
            user,
            conversation,
            private,
        }
    }

    pub fn bag(&self, scope: Scope) -> &Bag {
        match scope {
            Scope::User => &self.user,
            Scope::Conversation => &self.conversation,
            Scope::PrivateConversation => &self.private,
        }
    }

    fn bag_mut(&mut self, scope: Scope) -> &mut Bag {
        match scope {
            Scope::User => &mut self.user,
            Scope::Conversation => &mut self.conversation,
            Scope::PrivateConversation => &mut self.private,
        }
    }

    /// Typed read. A stored value of another shape is an error, not a coercion.
    pub fn get<T: DeserializeOwned>(&self, scope: Scope, key: &str) -> Result<Option<T>, DataError> {
        let Some(value) = self.bag(scope).get(key) else {
            return Ok(None);
        };
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|source| DataError::TypeMismatch {
                key: key.to_string(),
                source,
            })
    }

    pub fn set<T: Serialize + ?Sized>(
        &mut self,
        scope: Scope,
        key: impl Into<String>,
        value: &T,
    ) -> Result<(), DataError> {
        let value = serde_json::to_value(value)?;
        self.bag_mut(scope).insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&mut self, scope: Scope, key: &str) -> Option<Value> {
        self.bag_mut(scope).remove(key)
    }

    pub fn contains(&self, scope: Scope, key: &str) -> bool {
        self.bag(scope).contains_key(key)
    }

    pub fn clear(&mut self, scope: Scope) {
        self.bag_mut(scope).clear();
    }
}
