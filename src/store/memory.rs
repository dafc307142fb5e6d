//! In-process storage for tests and ephemeral runs

use super::{Bag, BotData, BotDataStore, SnapshotStore};
use crate::activity::{ConversationKey, Scope};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage backed by hash maps; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<String, Vec<u8>>>,
    bags: Mutex<HashMap<String, Bag>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored blob, if any
    pub fn snapshot(&self, key: &ConversationKey) -> Option<Vec<u8>> {
        self.snapshots
            .lock()
            .unwrap()
            .get(&key.snapshot_key())
            .cloned()
    }

    /// Overwrite the stored blob with arbitrary bytes
    pub fn put_snapshot(&self, key: &ConversationKey, blob: Vec<u8>) {
        self.snapshots
            .lock()
            .unwrap()
            .insert(key.snapshot_key(), blob);
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn try_load(&self, key: &ConversationKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.snapshot(key))
    }

    async fn save(&self, key: &ConversationKey, blob: &[u8]) -> Result<(), StoreError> {
        self.put_snapshot(key, blob.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &ConversationKey) -> Result<(), StoreError> {
        self.snapshots.lock().unwrap().remove(&key.snapshot_key());
        Ok(())
    }
}

#[async_trait]
impl BotDataStore for MemoryStore {
    async fn load_data(&self, key: &ConversationKey) -> Result<BotData, StoreError> {
        let bags = self.bags.lock().unwrap();
        let load = |scope: Scope| bags.get(&key.address(scope)).cloned().unwrap_or_default();
        Ok(BotData::new(
            load(Scope::User),
            load(Scope::Conversation),
            load(Scope::PrivateConversation),
        ))
    }

    async fn save_data(&self, key: &ConversationKey, data: &BotData) -> Result<(), StoreError> {
        let mut bags = self.bags.lock().unwrap();
        for scope in Scope::ALL {
            bags.insert(key.address(scope), data.bag(scope).clone());
        }
        Ok(())
    }
}
