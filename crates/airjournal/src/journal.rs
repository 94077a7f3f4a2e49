//! The journal: both record collections over one store.
//!
//! This is the surface a UI or the CLI talks to. Drafts go in, are
//! validated, and are written through the matching [`SyncedCollection`];
//! reads come from the collections' snapshots.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::aggregate::JournalStats;
use crate::config::{Config, StatsConfig};
use crate::error::{Error, Result, WriteOp};
use crate::form::{ActivityDraft, PlaceDraft};
use crate::record::{ActivityEntry, ActivityPatch, JournalRecord, PlaceMarker, RecordKind};
use crate::store::{record_path, RecordKey, RecordStore, StoreError};
use crate::sync::SyncedCollection;

/// Statistics for both collections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JournalSummary {
    /// Activity entry statistics.
    pub activities: JournalStats,
    /// Place marker statistics.
    pub places: JournalStats,
}

/// Activity entries and place markers kept in sync with one store.
pub struct Journal {
    store: Arc<dyn RecordStore>,
    activities: SyncedCollection<ActivityEntry>,
    places: SyncedCollection<PlaceMarker>,
    stats: StatsConfig,
}

impl Journal {
    /// Attach both collections named in `config` to `store`.
    pub fn open(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        let activities = SyncedCollection::attach(
            Arc::clone(&store),
            config.collection(RecordKind::Activity),
        );
        let places =
            SyncedCollection::attach(Arc::clone(&store), config.collection(RecordKind::Place));
        info!(
            "Opened journal on {} store ({} activities, {} places)",
            store.name(),
            activities.snapshot().len(),
            places.snapshot().len()
        );
        Self {
            store,
            activities,
            places,
            stats: config.stats.clone(),
        }
    }

    /// The activity entry collection.
    #[must_use]
    pub fn activities(&self) -> &SyncedCollection<ActivityEntry> {
        &self.activities
    }

    /// The place marker collection.
    #[must_use]
    pub fn places(&self) -> &SyncedCollection<PlaceMarker> {
        &self.places
    }

    /// Validate and save a new activity entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without writing if a required field is
    /// missing, or [`Error::Write`] if the store rejects the entry.
    pub async fn submit_activity(&self, draft: &ActivityDraft) -> Result<RecordKey> {
        let entry = draft.validate()?;
        self.activities.create(&entry).await
    }

    /// Change fields of an activity entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the patch blanks a required field,
    /// or [`Error::Write`] if the entry is gone or the store rejects it.
    pub async fn update_activity(&self, id: &RecordKey, patch: &ActivityPatch) -> Result<()> {
        for (field, value) in [
            ("activityKind", &patch.activity_kind),
            ("locationLabel", &patch.location_label),
        ] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(Error::missing(field));
            }
        }
        self.activities.update(id, patch).await
    }

    /// Delete an activity entry. Deleting one that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the store rejects the delete.
    pub async fn delete_activity(&self, id: &RecordKey) -> Result<()> {
        self.activities.delete(id).await
    }

    /// Validate and save a new place marker.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without writing if a required field is
    /// missing, or [`Error::Write`] if the store rejects the marker.
    pub async fn submit_place(&self, draft: &PlaceDraft) -> Result<RecordKey> {
        let marker = draft.validate()?;
        self.places.create(&marker).await
    }

    /// Validate and apply an edited place marker.
    ///
    /// The creation timestamp is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without writing if a required field is
    /// missing, or [`Error::Write`] if the marker is gone or the store
    /// rejects the edit.
    pub async fn edit_place(&self, id: &RecordKey, draft: &PlaceDraft) -> Result<()> {
        let patch = draft.validate_patch()?;
        self.places.update(id, &patch).await
    }

    /// Edit a place marker starting from its current values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the marker is not in the current
    /// snapshot, plus everything [`Journal::edit_place`] returns.
    pub async fn edit_place_with<F>(&self, id: &RecordKey, edit: F) -> Result<()>
    where
        F: FnOnce(&mut PlaceDraft),
    {
        let mut draft = {
            let snapshot = self.places.snapshot();
            let marker = snapshot.get(id).ok_or_else(|| {
                Error::write(
                    WriteOp::Update,
                    self.places.collection(),
                    StoreError::NotFound {
                        path: record_path(self.places.collection(), id),
                    },
                )
            })?;
            PlaceDraft::from_marker(marker)
        };
        edit(&mut draft);
        self.edit_place(id, &draft).await
    }

    /// Delete a place marker. Deleting one that is already gone succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the store rejects the delete.
    pub async fn delete_place(&self, id: &RecordKey) -> Result<()> {
        self.places.delete(id).await
    }

    /// Statistics for both collections with the configured parameters.
    #[must_use]
    pub fn summary(&self) -> JournalSummary {
        self.summary_with(&self.stats)
    }

    /// Statistics for both collections with explicit parameters.
    #[must_use]
    pub fn summary_with(&self, stats: &StatsConfig) -> JournalSummary {
        JournalSummary {
            activities: stats_of(&self.activities, stats),
            places: stats_of(&self.places, stats),
        }
    }

    /// The configured statistics parameters.
    #[must_use]
    pub fn stats_config(&self) -> &StatsConfig {
        &self.stats
    }
}

fn stats_of<R: JournalRecord>(collection: &SyncedCollection<R>, stats: &StatsConfig) -> JournalStats {
    JournalStats::compute(
        &collection.snapshot(),
        stats.window_days,
        stats.best_air_threshold,
    )
}

impl fmt::Debug for Journal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("store", &self.store.name())
            .field("activities", &self.activities)
            .field("places", &self.places)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aqi::Category;
    use crate::logging::init_test_logging;
    use crate::store::{MemoryStore, RawCollection, SqliteStore};
    use serde_json::json;

    fn journal_on(store: &Arc<MemoryStore>) -> Journal {
        init_test_logging();
        Journal::open(Arc::clone(store) as Arc<dyn RecordStore>, &Config::default())
    }

    fn park() -> PlaceDraft {
        let mut draft = PlaceDraft {
            name: "Park".to_string(),
            coordinates: "-7.8,110.4".to_string(),
            ..PlaceDraft::default()
        };
        draft.aqi.set_text("180");
        draft
    }

    fn run() -> ActivityDraft {
        ActivityDraft {
            activity_kind: "Running".to_string(),
            duration: "30".to_string(),
            location_label: "Riverside".to_string(),
            ..ActivityDraft::default()
        }
    }

    #[tokio::test]
    async fn test_submit_place_stores_derived_category() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);

        let key = journal.submit_place(&park()).await.unwrap();

        let snapshot = journal.places().snapshot();
        let marker = snapshot.get(&key).unwrap();
        assert_eq!(marker.aqi_category, Category::Unhealthy);
        assert_eq!(marker.emoji, Category::Unhealthy.emoji());
        assert_eq!(
            store.raw("place_markers").unwrap()[key.as_str()]["emoji"],
            "😷"
        );
    }

    #[tokio::test]
    async fn test_missing_location_never_reaches_store() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        let draft = ActivityDraft {
            location_label: String::new(),
            ..run()
        };

        let err = journal.submit_activity(&draft).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(err.missing_field(), Some("locationLabel"));
        assert_eq!(store.write_calls(), 0);
        assert!(journal.activities().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_delete_place_twice() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        let key = journal.submit_place(&park()).await.unwrap();

        journal.delete_place(&key).await.unwrap();
        assert!(!journal.places().snapshot().contains(&key));
        journal.delete_place(&key).await.unwrap();
        assert!(!journal.places().snapshot().contains(&key));
    }

    #[tokio::test]
    async fn test_edit_place_with_keeps_other_fields() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        let key = journal.submit_place(&park()).await.unwrap();
        let created = journal.places().snapshot().get(&key).unwrap().timestamp;

        journal
            .edit_place_with(&key, |draft| {
                draft.aqi.select_category(Category::Good);
            })
            .await
            .unwrap();

        let snapshot = journal.places().snapshot();
        let marker = snapshot.get(&key).unwrap();
        assert_eq!(marker.name, "Park");
        assert_eq!(marker.aqi.value(), 75);
        assert_eq!(marker.aqi_category, Category::Good);
        assert_eq!(marker.timestamp, created);
        assert!(marker.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_edit_unknown_place_is_write_error() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);

        let err = journal
            .edit_place_with(&RecordKey::from("-Nghost"), |_| {})
            .await
            .unwrap_err();
        assert!(err.is_write());
        assert_eq!(store.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_edit_place_validates_first() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        let key = journal.submit_place(&park()).await.unwrap();

        let err = journal
            .edit_place_with(&key, |draft| draft.name.clear())
            .await
            .unwrap_err();
        assert_eq!(err.missing_field(), Some("name"));
        assert_eq!(store.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_update_activity() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        let key = journal.submit_activity(&run()).await.unwrap();

        journal
            .update_activity(
                &key,
                &ActivityPatch {
                    notes: Some("windy".to_string()),
                    duration_minutes: Some(50),
                    ..ActivityPatch::default()
                },
            )
            .await
            .unwrap();
        journal
            .update_activity(&key, &ActivityPatch::default())
            .await
            .unwrap();
        let err = journal
            .update_activity(
                &key,
                &ActivityPatch {
                    location_label: Some(" ".to_string()),
                    ..ActivityPatch::default()
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.missing_field(), Some("locationLabel"));
        assert_eq!(store.write_calls(), 3);
        let snapshot = journal.activities().snapshot();
        let entry = snapshot.get(&key).unwrap();
        assert_eq!(entry.notes.as_deref(), Some("windy"));
        assert_eq!(entry.duration_minutes, Some(50));
    }

    #[tokio::test]
    async fn test_empty_update_of_missing_activity_is_write_error() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);

        let err = journal
            .update_activity(&RecordKey::from("-Nghost"), &ActivityPatch::default())
            .await
            .unwrap_err();
        assert!(err.is_write());
    }

    fn older_format(key: &str, value: serde_json::Value) -> RawCollection {
        let mut raw = RawCollection::new();
        raw.insert(key.to_string(), value.as_object().cloned().unwrap());
        raw
    }

    #[tokio::test]
    async fn test_edit_older_format_place_stays_listed() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        store.inject_remote(
            "place_markers",
            Some(older_format(
                "-Nold",
                json!({
                    "name": "Park",
                    "coordinates": "-7.8,110.4",
                    "accuracy": "5.00 meter",
                    "aqi": "60",
                }),
            )),
        );
        let key = RecordKey::from("-Nold");
        assert_eq!(
            journal.places().snapshot().get(&key).unwrap().accuracy_meters.as_deref(),
            Some("5.00 meter")
        );

        journal
            .edit_place_with(&key, |draft| draft.name = "Gate".to_string())
            .await
            .unwrap();

        let snapshot = journal.places().snapshot();
        let marker = snapshot.get(&key).unwrap();
        assert_eq!(marker.name, "Gate");
        assert_eq!(marker.accuracy_meters.as_deref(), Some("5.00 meter"));
        assert_eq!(journal.summary().places.total_count, 1);
    }

    #[tokio::test]
    async fn test_update_older_format_activity_stays_listed() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        store.inject_remote(
            "activity_entries",
            Some(older_format(
                "-Nold",
                json!({
                    "date": "2026-10-01T07:30:00Z",
                    "activity": "Running",
                    "duration": "40",
                    "location": "Park",
                    "aqi": 45,
                }),
            )),
        );
        let key = RecordKey::from("-Nold");
        assert_eq!(journal.activities().snapshot().len(), 1);

        journal
            .update_activity(
                &key,
                &ActivityPatch {
                    location_label: Some("Track".to_string()),
                    ..ActivityPatch::default()
                },
            )
            .await
            .unwrap();

        let snapshot = journal.activities().snapshot();
        assert_eq!(snapshot.len(), 1);
        let entry = snapshot.get(&key).unwrap();
        assert_eq!(entry.location_label, "Track");
        assert_eq!(entry.activity_kind, "Running");
        assert_eq!(entry.duration_minutes, Some(40));
        let raw = store.raw("activity_entries").unwrap();
        let stored = &raw["-Nold"];
        assert!(!stored.contains_key("location"));
        assert_eq!(stored["activity"], "Running");
    }

    #[tokio::test]
    async fn test_rejected_write_surfaces() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);
        store.reject_writes("offline");

        let err = journal.submit_activity(&run()).await.unwrap_err();
        assert!(err.is_write());
        assert!(err.to_string().contains("activity_entries"));
    }

    #[tokio::test]
    async fn test_summary_tracks_snapshots() {
        let store = MemoryStore::shared();
        let journal = journal_on(&store);

        journal.submit_activity(&run()).await.unwrap();
        journal
            .submit_activity(&ActivityDraft {
                duration: "45".to_string(),
                ..run()
            })
            .await
            .unwrap();
        journal.submit_place(&park()).await.unwrap();

        let summary = journal.summary();
        assert_eq!(summary.activities.total_count, 2);
        assert_eq!(summary.activities.window_count, 2);
        assert_eq!(summary.activities.total_duration_minutes, 75);
        assert_eq!(summary.activities.best_air_count, 2);
        assert_eq!(summary.places.total_count, 1);
        assert_eq!(summary.places.best_air_count, 0);
        assert_eq!(summary, journal.summary());
    }

    #[tokio::test]
    async fn test_custom_collections() {
        let store = MemoryStore::shared();
        let mut config = Config::default();
        config.store.place_collection = "locations".to_string();
        let journal = Journal::open(Arc::clone(&store) as Arc<dyn RecordStore>, &config);

        journal.submit_place(&park()).await.unwrap();
        assert!(store.raw("place_markers").is_none());
        assert_eq!(store.raw("locations").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_journal_over_sqlite() {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let journal = Journal::open(store, &Config::default());

        let first = journal.submit_activity(&run()).await.unwrap();
        let second = journal
            .submit_activity(&ActivityDraft {
                activity_kind: "Walking".to_string(),
                ..run()
            })
            .await
            .unwrap();

        let snapshot = journal.activities().snapshot();
        assert_eq!(snapshot.len(), 2);
        // Newest first.
        assert_eq!(snapshot.records()[0].id, second);
        assert_eq!(snapshot.records()[1].id, first);

        journal.delete_activity(&first).await.unwrap();
        journal.delete_activity(&first).await.unwrap();
        assert_eq!(journal.activities().snapshot().len(), 1);
    }
}
