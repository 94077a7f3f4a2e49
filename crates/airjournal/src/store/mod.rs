//! Record store adapters.
//!
//! A record store is a keyed, appendable, subscribable collection of flat
//! field maps, in the manner of a realtime database. [`RecordStore`] is the
//! contract the journal core consumes; [`MemoryStore`] and [`SqliteStore`]
//! implement it.

mod memory;
pub mod push_id;
pub mod sqlite;
mod subscription;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use push_id::PushIdGenerator;
pub use sqlite::{SqliteStore, StorageStats};
pub use subscription::Subscription;
pub(crate) use subscription::SubscriberSet;

/// A flat mapping of field name to value, as persisted for one record.
pub type Fields = serde_json::Map<String, Value>;

/// All records of one collection, keyed by store key.
pub type RawCollection = BTreeMap<String, Fields>;

/// What a store delivers to subscribers. `None` means an empty collection.
pub type RawSnapshot = Option<RawCollection>;

/// Callback invoked with the full contents of a collection.
pub type StoreCallback = Arc<dyn Fn(&RawSnapshot) + Send + Sync>;

/// Errors reported by store adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the write.
    #[error("write rejected at {path}: {reason}")]
    Rejected {
        /// Path the write targeted.
        path: String,
        /// Reason given by the store.
        reason: String,
    },

    /// The caller may not write here.
    #[error("permission denied at {path}")]
    PermissionDenied {
        /// Path the write targeted.
        path: String,
    },

    /// No record exists at the path.
    #[error("no record at {path}")]
    NotFound {
        /// Path that was looked up.
        path: String,
    },

    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The storage engine failed.
    #[error("storage engine error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored fields could not be encoded or decoded.
    #[error("malformed fields: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Check if the error only says the record was absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A store-assigned record key.
///
/// Keys are assigned on creation and never change. Keys from one store sort
/// in creation order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    /// Wrap an existing key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RecordKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// The path of one record, `collection/key`.
#[must_use]
pub fn record_path(collection: &str, key: &RecordKey) -> String {
    format!("{collection}/{key}")
}

/// Merge `patch` into `target`. A `null` patch value removes the field.
pub fn apply_patch(target: &mut Fields, patch: Fields) {
    for (name, value) in patch {
        if value.is_null() {
            target.remove(&name);
        } else {
            target.insert(name, value);
        }
    }
}

/// A remote keyed collection store with change subscriptions.
///
/// Writes complete asynchronously. Subscribers see every change as a whole
/// new collection payload; there is no ordering guarantee between a write's
/// completion and the delivery that reflects it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short name of the adapter, for logs.
    fn name(&self) -> &'static str;

    /// Append a record, returning its newly assigned key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    async fn push_new(&self, collection: &str, data: Fields) -> StoreResult<RecordKey>;

    /// Merge `patch` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the record does not exist, or
    /// another error if the store rejects the write.
    async fn update_at(&self, collection: &str, key: &RecordKey, patch: Fields)
        -> StoreResult<()>;

    /// Remove a record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    async fn remove_at(&self, collection: &str, key: &RecordKey) -> StoreResult<()>;

    /// Register `callback` for the collection.
    ///
    /// The callback fires once immediately with the current contents and
    /// again after every change, until the returned handle is cancelled.
    fn subscribe(&self, collection: &str, callback: StoreCallback) -> Subscription;
}
