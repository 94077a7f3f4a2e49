//! Synchronized collections.
//!
//! A [`SyncedCollection`] mirrors one store collection as an ordered
//! [`Snapshot`]. The snapshot is only ever replaced by the store's
//! subscription callback, never by the write operations, so a write's
//! completion and the snapshot that reflects it may arrive in either order.

use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::aggregate::JournalStats;
use crate::error::{Error, Result, WriteOp};
use crate::record::JournalRecord;
use crate::store::{
    Fields, RawSnapshot, RecordKey, RecordStore, StoreCallback, SubscriberSet, Subscription,
};

/// Order two records newest first.
///
/// Records are compared by creation timestamp, descending; records without
/// one come after all that have one. Ties fall back to the store key,
/// descending.
pub fn newest_first<R: JournalRecord>(a: &R, b: &R) -> Ordering {
    let by_time = match (a.timestamp(), b.timestamp()) {
        (Some(a_time), Some(b_time)) => b_time.cmp(&a_time),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_time.then_with(|| b.id().cmp(a.id()))
}

/// A complete, ordered, point-in-time view of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<R> {
    records: Vec<R>,
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<R: JournalRecord> Snapshot<R> {
    /// An empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot from records in any order.
    #[must_use]
    pub fn from_records(mut records: Vec<R>) -> Self {
        records.sort_by(newest_first);
        Self { records }
    }

    /// Decode a raw store payload.
    ///
    /// A `None` payload is an empty collection. Entries that cannot be read
    /// are skipped with a warning.
    #[must_use]
    pub fn from_payload(payload: &RawSnapshot) -> Self {
        let Some(raw) = payload else {
            return Self::empty();
        };

        let records = raw
            .iter()
            .filter_map(|(key, fields)| {
                match R::decode(RecordKey::new(key.as_str()), fields) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping unreadable {} {}: {}", R::KIND, key, e);
                        None
                    }
                }
            })
            .collect();
        Self::from_records(records)
    }

    /// Records, newest first.
    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Iterate over records, newest first.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by key.
    #[must_use]
    pub fn get(&self, id: &RecordKey) -> Option<&R> {
        self.records.iter().find(|record| record.id() == id)
    }

    /// Check whether a record with this key is present.
    #[must_use]
    pub fn contains(&self, id: &RecordKey) -> bool {
        self.get(id).is_some()
    }

    /// The most recent record.
    #[must_use]
    pub fn newest(&self) -> Option<&R> {
        self.records.first()
    }
}

impl<'a, R> IntoIterator for &'a Snapshot<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Shared between the collection and the store callback.
struct SyncState<R> {
    current: Mutex<Arc<Snapshot<R>>>,
    listeners: SubscriberSet<Arc<Snapshot<R>>>,
}

impl<R: JournalRecord> SyncState<R> {
    fn current(&self) -> Arc<Snapshot<R>> {
        Arc::clone(&*self.current.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn replace(&self, payload: &RawSnapshot) {
        let snapshot = Arc::new(Snapshot::from_payload(payload));
        {
            let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
            *current = Arc::clone(&snapshot);
        }
        let delivered = self.listeners.notify(&snapshot);
        debug!(
            "Replaced {} snapshot ({} records, {} listener(s))",
            R::KIND,
            snapshot.len(),
            delivered
        );
    }
}

/// A local, ordered mirror of one store collection.
///
/// Attaching subscribes to the store; dropping the collection cancels that
/// subscription.
pub struct SyncedCollection<R: JournalRecord> {
    store: Arc<dyn RecordStore>,
    collection: String,
    state: Arc<SyncState<R>>,
    upstream: Subscription,
}

impl<R: JournalRecord> SyncedCollection<R> {
    /// Mirror `collection` of `store`.
    ///
    /// The store delivers the current contents during this call, so the
    /// snapshot is populated as soon as it returns.
    pub fn attach(store: Arc<dyn RecordStore>, collection: impl Into<String>) -> Self {
        let collection = collection.into();
        let state = Arc::new(SyncState {
            current: Mutex::new(Arc::new(Snapshot::empty())),
            listeners: SubscriberSet::new(),
        });

        let sink = Arc::clone(&state);
        let callback: StoreCallback = Arc::new(move |payload: &RawSnapshot| sink.replace(payload));
        let upstream = store.subscribe(&collection, callback);
        debug!(
            "Attached {} collection '{}' to {} store",
            R::KIND,
            collection,
            store.name()
        );

        Self {
            store,
            collection,
            state,
            upstream,
        }
    }

    /// Store path of the mirrored collection.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// The current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot<R>> {
        self.state.current()
    }

    /// Register a snapshot listener.
    ///
    /// The listener runs once immediately with the current snapshot and then
    /// after every change, until the returned handle is cancelled.
    pub fn subscribe<F>(&self, on_snapshot: F) -> Subscription
    where
        F: Fn(&Arc<Snapshot<R>>) + Send + Sync + 'static,
    {
        let listener: Arc<dyn Fn(&Arc<Snapshot<R>>) + Send + Sync> = Arc::new(on_snapshot);
        let subscription = self.state.listeners.add(Arc::clone(&listener));
        listener(&self.state.current());
        subscription
    }

    /// Register a listener for statistics recomputed on every snapshot.
    pub fn subscribe_stats<F>(
        &self,
        window_days: u32,
        best_air_threshold: u16,
        on_stats: F,
    ) -> Subscription
    where
        F: Fn(JournalStats) + Send + Sync + 'static,
    {
        self.subscribe(move |snapshot| {
            on_stats(JournalStats::compute(
                snapshot,
                window_days,
                best_air_threshold,
            ));
        })
    }

    /// Submit a new record, returning the key the store assigned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the store rejects the write. Nothing is
    /// retried.
    pub async fn create(&self, draft: &R::New) -> Result<RecordKey> {
        let fields = to_fields(draft)?;
        match self.store.push_new(&self.collection, fields).await {
            Ok(key) => {
                debug!("Created {} {}", R::KIND, key);
                Ok(key)
            }
            Err(source) => {
                warn!("Create in '{}' failed: {}", self.collection, source);
                Err(Error::write(
                    WriteOp::Create,
                    self.collection.as_str(),
                    source,
                ))
            }
        }
    }

    /// Merge `patch` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the record does not exist or the store
    /// rejects the write.
    pub async fn update(&self, id: &RecordKey, patch: &R::Patch) -> Result<()> {
        let mut fields = to_fields(patch)?;
        retire_legacy_fields::<R>(&mut fields);
        match self.store.update_at(&self.collection, id, fields).await {
            Ok(()) => {
                debug!("Updated {} {}", R::KIND, id);
                Ok(())
            }
            Err(source) => {
                warn!("Update of {} in '{}' failed: {}", id, self.collection, source);
                Err(Error::write(
                    WriteOp::Update,
                    self.collection.as_str(),
                    source,
                ))
            }
        }
    }

    /// Remove a record. Removing a record that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the store rejects the write.
    pub async fn delete(&self, id: &RecordKey) -> Result<()> {
        match self.store.remove_at(&self.collection, id).await {
            Ok(()) => {
                debug!("Deleted {} {}", R::KIND, id);
                Ok(())
            }
            Err(source) if source.is_not_found() => {
                debug!("{} {} already gone", R::KIND, id);
                Ok(())
            }
            Err(source) => {
                warn!("Delete of {} in '{}' failed: {}", id, self.collection, source);
                Err(Error::write(
                    WriteOp::Delete,
                    self.collection.as_str(),
                    source,
                ))
            }
        }
    }
}

impl<R: JournalRecord> Drop for SyncedCollection<R> {
    fn drop(&mut self) {
        if self.upstream.cancel() {
            debug!("Detached {} collection '{}'", R::KIND, self.collection);
        }
    }
}

impl<R: JournalRecord> fmt::Debug for SyncedCollection<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncedCollection")
            .field("collection", &self.collection)
            .field("store", &self.store.name())
            .field("records", &self.state.current().len())
            .finish_non_exhaustive()
    }
}

/// Null out the older name of every field the patch writes, so the store
/// drops it.
fn retire_legacy_fields<R: JournalRecord>(fields: &mut Fields) {
    for (current, legacy) in R::LEGACY_FIELDS {
        if fields.contains_key(*current) {
            fields.insert((*legacy).to_string(), serde_json::Value::Null);
        }
    }
}

fn to_fields<T: serde::Serialize>(payload: &T) -> Result<Fields> {
    match serde_json::to_value(payload)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(Error::internal(format!(
            "record payload must serialize to an object, got {other}"
        ))),
    }
}
