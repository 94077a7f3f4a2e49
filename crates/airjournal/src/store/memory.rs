//! In-process record store.
//!
//! Behaves like a realtime database held in memory: writes notify
//! subscribers synchronously with the full collection. Write failures and
//! raw remote payloads can be injected, which makes it the fake of choice
//! for exercising the synchronized collection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use super::subscription::CollectionSubscribers;
use super::{
    apply_patch, record_path, Fields, PushIdGenerator, RawCollection, RawSnapshot, RecordKey,
    RecordStore, StoreCallback, StoreError, StoreResult, Subscription,
};

/// How the store currently answers writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum WriteMode {
    Accept,
    Reject(String),
    Deny,
}

/// An in-memory [`RecordStore`].
#[derive(Debug)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, RawCollection>>,
    keys: PushIdGenerator,
    subscribers: CollectionSubscribers<RawSnapshot>,
    mode: Mutex<WriteMode>,
    write_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            keys: PushIdGenerator::new(),
            subscribers: CollectionSubscribers::new(),
            mode: Mutex::new(WriteMode::Accept),
            write_calls: AtomicUsize::new(0),
        }
    }

    /// Create an empty store behind an `Arc`, ready to share.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Make every following write fail with [`StoreError::Rejected`].
    pub fn reject_writes(&self, reason: impl Into<String>) {
        *self.lock_mode() = WriteMode::Reject(reason.into());
    }

    /// Make every following write fail with [`StoreError::PermissionDenied`].
    pub fn deny_writes(&self) {
        *self.lock_mode() = WriteMode::Deny;
    }

    /// Accept writes again.
    pub fn accept_writes(&self) {
        *self.lock_mode() = WriteMode::Accept;
    }

    /// Number of write calls received, successful or not.
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Replace a collection wholesale, as if another client had written it,
    /// and notify subscribers with exactly `payload`.
    pub fn inject_remote(&self, collection: &str, payload: RawSnapshot) {
        self.subscribers.publish_latest(collection, || {
            let mut collections = self.lock_collections();
            match &payload {
                Some(records) => {
                    collections.insert(collection.to_string(), records.clone());
                }
                None => {
                    collections.remove(collection);
                }
            }
            Some(payload)
        });
    }

    /// Current raw contents of a collection.
    #[must_use]
    pub fn raw(&self, collection: &str) -> RawSnapshot {
        self.lock_collections()
            .get(collection)
            .filter(|records| !records.is_empty())
            .cloned()
    }

    fn lock_mode(&self) -> std::sync::MutexGuard<'_, WriteMode> {
        self.mode.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_collections(&self) -> std::sync::MutexGuard<'_, HashMap<String, RawCollection>> {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self, path: &str) -> StoreResult<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        match &*self.lock_mode() {
            WriteMode::Accept => Ok(()),
            WriteMode::Reject(reason) => Err(StoreError::Rejected {
                path: path.to_string(),
                reason: reason.clone(),
            }),
            WriteMode::Deny => Err(StoreError::PermissionDenied {
                path: path.to_string(),
            }),
        }
    }

    fn publish(&self, collection: &str) {
        let delivered = self
            .subscribers
            .publish_latest(collection, || Some(self.raw(collection)));
        debug!("Published {} to {} listener(s)", collection, delivered);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn push_new(&self, collection: &str, data: Fields) -> StoreResult<RecordKey> {
        self.check_writable(collection)?;
        let key = self.keys.next_key(Utc::now());
        self.lock_collections()
            .entry(collection.to_string())
            .or_default()
            .insert(key.as_str().to_string(), data);
        debug!("Pushed {}", record_path(collection, &key));
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
        self.check_writable(&path)?;
        {
            let mut collections = self.lock_collections();
            let record = collections
                .get_mut(collection)
                .and_then(|records| records.get_mut(key.as_str()))
                .ok_or_else(|| StoreError::NotFound { path: path.clone() })?;
            apply_patch(record, patch);
        }
        debug!("Updated {}", path);
        self.publish(collection);
        Ok(())
    }

    async fn remove_at(&self, collection: &str, key: &RecordKey) -> StoreResult<()> {
        let path = record_path(collection, key);
        self.check_writable(&path)?;
        let removed = self
            .lock_collections()
            .get_mut(collection)
            .and_then(|records| records.remove(key.as_str()))
            .is_some();
        if removed {
            debug!("Removed {}", path);
            self.publish(collection);
        } else {
            debug!("Nothing to remove at {}", path);
        }
        Ok(())
    }

    fn subscribe(&self, collection: &str, callback: StoreCallback) -> Subscription {
        let subscription = self
            .subscribers
            .subscribe(collection, Arc::clone(&callback));
        callback(&self.raw(collection));
        subscription
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().expect("object")
    }

    fn recorder() -> (Arc<Mutex<Vec<RawSnapshot>>>, StoreCallback) {
        let seen: Arc<Mutex<Vec<RawSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        let callback: StoreCallback = Arc::new(move |payload: &RawSnapshot| {
            inner.lock().unwrap().push(payload.clone());
        });
        (seen, callback)
    }

    #[tokio::test]
    async fn test_subscribe_fires_immediately_with_none() {
        let store = MemoryStore::new();
        let (seen, callback) = recorder();
        store.subscribe("points", callback);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_none());
    }

    #[tokio::test]
    async fn test_push_new_assigns_increasing_keys() {
        let store = MemoryStore::new();
        let first = store
            .push_new("points", fields(json!({"name": "A"})))
            .await
            .unwrap();
        let second = store
            .push_new("points", fields(json!({"name": "B"})))
            .await
            .unwrap();
        assert!(second > first);
        assert_eq!(store.raw("points").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_push_new_notifies_subscribers() {
        let store = MemoryStore::new();
        let (seen, callback) = recorder();
        store.subscribe("points", callback);

        let key = store
            .push_new("points", fields(json!({"name": "Park"})))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        let latest = seen[1].as_ref().unwrap();
        assert_eq!(latest[key.as_str()]["name"], "Park");
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let key = store
            .push_new("points", fields(json!({"name": "Park", "aqi": 20})))
            .await
            .unwrap();
        store
            .update_at("points", &key, fields(json!({"aqi": 180})))
            .await
            .unwrap();

        let raw = store.raw("points").unwrap();
        assert_eq!(raw[key.as_str()]["name"], "Park");
        assert_eq!(raw[key.as_str()]["aqi"], 180);
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update_at("points", &RecordKey::from("-Nmissing"), Fields::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemoryStore::new();
        let key = store
            .push_new("points", fields(json!({"name": "Park"})))
            .await
            .unwrap();
        let (seen, callback) = recorder();
        store.subscribe("points", callback);

        store.remove_at("points", &key).await.unwrap();
        store.remove_at("points", &key).await.unwrap();

        let seen = seen.lock().unwrap();
        // Initial delivery plus one for the real removal.
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_none());
    }

    #[tokio::test]
    async fn test_rejected_and_denied_writes() {
        let store = MemoryStore::new();
        store.reject_writes("offline");
        let err = store.push_new("points", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { ref reason, .. } if reason == "offline"));

        store.deny_writes();
        let err = store.push_new("points", Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::PermissionDenied { .. }));

        store.accept_writes();
        assert!(store.push_new("points", Fields::new()).await.is_ok());
        assert_eq!(store.write_calls(), 3);
    }

    #[tokio::test]
    async fn test_inject_remote_null_payload() {
        let store = MemoryStore::new();
        store
            .push_new("points", fields(json!({"name": "Park"})))
            .await
            .unwrap();
        let (seen, callback) = recorder();
        store.subscribe("points", callback);

        store.inject_remote("points", None);

        assert!(store.raw("points").is_none());
        assert!(seen.lock().unwrap().last().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_subscription_stops_deliveries() {
        let store = MemoryStore::new();
        let (seen, callback) = recorder();
        let subscription = store.subscribe("points", callback);
        subscription.cancel();

        store
            .push_new("points", fields(json!({"name": "Park"})))
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_writers_end_on_newest_payload() {
        let store = MemoryStore::shared();
        let (seen, callback) = recorder();
        store.subscribe("points", callback);

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .push_new("points", fields(json!({ "n": i })))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 17);
        assert_eq!(seen.last().unwrap().as_ref().unwrap().len(), 16);
    }
}
