//! SQLite persistence for snapshots and data bags

use super::{Bag, BotData, BotDataStore, SnapshotStore};
use crate::activity::{ConversationKey, Scope};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// SQL schema for initialization
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS snapshots (
    conversation_key TEXT PRIMARY KEY,
    blob BLOB NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS bot_data (
    address TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bot_data_scope ON bot_data(scope);
";

/// Migration adding the blob size column used for diagnostics
const MIGRATION_SNAPSHOT_SIZE: &str =
    "ALTER TABLE snapshots ADD COLUMN size INTEGER NOT NULL DEFAULT 0";

pub type DbResult<T> = Result<T, StoreError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        // Ignore the error when the column already exists
        let _ = conn.execute(MIGRATION_SNAPSHOT_SIZE, []);
        Ok(())
    }

    // ==================== Snapshot Operations ====================

    pub fn load_snapshot(&self, conversation_key: &str) -> DbResult<Option<Vec<u8>>> {
        let conn = self.conn.lock().unwrap();
        let blob = conn
            .query_row(
                "SELECT blob FROM snapshots WHERE conversation_key = ?1",
                params![conversation_key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(blob)
    }

    pub fn save_snapshot(&self, conversation_key: &str, blob: &[u8]) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO snapshots (conversation_key, blob, updated_at, size)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(conversation_key) DO UPDATE SET
                blob = excluded.blob,
                updated_at = excluded.updated_at,
                size = excluded.size",
            params![
                conversation_key,
                blob,
                Utc::now().to_rfc3339(),
                i64::try_from(blob.len()).unwrap_or(i64::MAX)
            ],
        )?;
        Ok(())
    }

    pub fn delete_snapshot(&self, conversation_key: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM snapshots WHERE conversation_key = ?1",
            params![conversation_key],
        )?;
        Ok(())
    }

    // ==================== Data Bag Operations ====================

    pub fn load_bag(&self, address: &str) -> DbResult<Bag> {
        let conn = self.conn.lock().unwrap();
        let data = conn
            .query_row(
                "SELECT data FROM bot_data WHERE address = ?1",
                params![address],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match data {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Bag::new()),
        }
    }

    pub fn save_bag(&self, address: &str, scope: Scope, bag: &Bag) -> DbResult<()> {
        let json = serde_json::to_string(bag)?;
        let scope = serde_json::to_value(scope)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO bot_data (address, scope, data, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(address) DO UPDATE SET
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![address, scope.as_str().unwrap_or_default(), json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Adapter to use `Database` as engine storage
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SnapshotStore for SqliteStore {
    async fn try_load(&self, key: &ConversationKey) -> Result<Option<Vec<u8>>, StoreError> {
        self.db.load_snapshot(&key.snapshot_key())
    }

    async fn save(&self, key: &ConversationKey, blob: &[u8]) -> Result<(), StoreError> {
        self.db.save_snapshot(&key.snapshot_key(), blob)
    }

    async fn delete(&self, key: &ConversationKey) -> Result<(), StoreError> {
        self.db.delete_snapshot(&key.snapshot_key())
    }
}

#[async_trait]
impl BotDataStore for SqliteStore {
    async fn load_data(&self, key: &ConversationKey) -> Result<BotData, StoreError> {
        Ok(BotData::new(
            self.db.load_bag(&key.address(Scope::User))?,
            self.db.load_bag(&key.address(Scope::Conversation))?,
            self.db.load_bag(&key.address(Scope::PrivateConversation))?,
        ))
    }

    async fn save_data(&self, key: &ConversationKey, data: &BotData) -> Result<(), StoreError> {
        for scope in Scope::ALL {
            self.db.save_bag(&key.address(scope), scope, data.bag(scope))?;
        }
        Ok(())
    }
}
