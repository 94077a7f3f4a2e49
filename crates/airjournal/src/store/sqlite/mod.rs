//! Local record store backed by `SQLite`.
//!
//! Each record is one row holding its fields as a JSON document. After every
//! successful write the affected collection is reloaded and published to its
//! subscribers, so the store behaves like its realtime counterpart.

pub mod migrations;
pub mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::subscription::CollectionSubscribers;
use super::{
    apply_patch, record_path, Fields, PushIdGenerator, RawCollection, RawSnapshot, RecordKey,
    RecordStore, StoreCallback, StoreError, StoreResult, Subscription,
};
use crate::error::{Error, Result};

/// A [`RecordStore`] persisted in a local `SQLite` database.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
    keys: PushIdGenerator,
    subscribers: CollectionSubscribers<RawSnapshot>,
}

impl SqliteStore {
    /// Open or create a store database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening journal database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Journal database opened at {}", path.display());
        Ok(Self::with_connection(path, conn))
    }

    /// Create an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self::with_connection(PathBuf::from(":memory:"), conn))
    }

    fn with_connection(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Mutex::new(conn),
            keys: PushIdGenerator::new(),
            subscribers: CollectionSubscribers::new(),
        }
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load every record of a collection. `None` if it is empty.
    ///
    /// Rows whose stored fields are not a JSON object are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn load(&self, collection: &str) -> StoreResult<RawSnapshot> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT key, fields FROM records WHERE collection = ?1 ORDER BY key")?;
        let rows = stmt
            .query_map([collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = RawCollection::new();
        for (key, text) in rows {
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(fields)) => {
                    records.insert(key, fields);
                }
                Ok(_) | Err(_) => {
                    warn!("Skipping malformed record {}/{}", collection, key);
                }
            }
        }

        Ok(if records.is_empty() { None } else { Some(records) })
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the database
    /// file can no longer be read.
    pub fn stats(&self) -> Result<StorageStats> {
        let collections = {
            let conn = self.lock();
            let mut stmt = conn.prepare(
                "SELECT collection, COUNT(*) FROM records GROUP BY collection ORDER BY collection",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()?;
            rows
        };
        let total_records = collections.values().sum();

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path)?.len()
        };

        Ok(StorageStats {
            collections,
            total_records,
            db_size_bytes,
        })
    }

    fn publish(&self, collection: &str) {
        let delivered = self.subscribers.publish_latest(collection, || {
            self.load(collection)
                .map_err(|e| warn!("Failed to reload {} after write: {}", collection, e))
                .ok()
        });
        debug!("Published {} to {} listener(s)", collection, delivered);
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn push_new(&self, collection: &str, data: Fields) -> StoreResult<RecordKey> {
        let key = self.keys.next_key(Utc::now());
        let text = serde_json::to_string(&data)?;
        self.lock().execute(
            "INSERT INTO records (collection, key, fields) VALUES (?1, ?2, ?3)",
            params![collection, key.as_str(), text],
        )?;
        debug!("Inserted {}", record_path(collection, &key));
        self.publish(collection);
        Ok(key)
    }

    async fn update_at(
        &self,
        collection: &str,
        key: &RecordKey,
        patch: Fields,
    ) -> StoreResult<()> {
        let path = record_path(collection, key);
        {
            let conn = self.lock();
            let stored: Option<String> = conn
                .query_row(
                    "SELECT fields FROM records WHERE collection = ?1 AND key = ?2",
                    params![collection, key.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let stored = stored.ok_or_else(|| StoreError::NotFound { path: path.clone() })?;

            let mut fields = match serde_json::from_str::<Value>(&stored) {
                Ok(Value::Object(fields)) => fields,
                Ok(_) | Err(_) => {
                    warn!("Replacing malformed record at {}", path);
                    Fields::new()
                }
            };
            apply_patch(&mut fields, patch);

            conn.execute(
                r"
                UPDATE records SET fields = ?3, updated_at = datetime('now')
                WHERE collection = ?1 AND key = ?2
                ",
                params![collection, key.as_str(), serde_json::to_string(&fields)?],
            )?;
        }
        debug!("Updated {}", path);
        self.publish(collection);
        Ok(())
    }

    async fn remove_at(&self, collection: &str, key: &RecordKey) -> StoreResult<()> {
        let affected = self.lock().execute(
            "DELETE FROM records WHERE collection = ?1 AND key = ?2",
            params![collection, key.as_str()],
        )?;
        if affected > 0 {
            debug!("Deleted {}", record_path(collection, key));
            self.publish(collection);
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str, callback: StoreCallback) -> Subscription {
        let subscription = self
            .subscribers
            .subscribe(collection, Arc::clone(&callback));
        let payload = self.load(collection).unwrap_or_else(|e| {
            warn!("Failed to load {} for new subscriber: {}", collection, e);
            None
        });
        callback(&payload);
        subscription
    }
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Record count per collection.
    pub collections: BTreeMap<String, i64>,
    /// Total number of records stored.
    pub total_records: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
