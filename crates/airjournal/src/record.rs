//! Journal record types.
//!
//! Two kinds of record share one shape: an [`ActivityEntry`] logs an outdoor
//! workout, a [`PlaceMarker`] pins a location. Both carry a store-assigned
//! id and an [`Aqi`] reading.
//!
//! Reading is lenient. Stored maps may come from older app versions or other
//! clients, so numbers may arrive as text, fields may be missing, and legacy
//! field names are accepted. Writing always uses the current names.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aqi::{Aqi, Category};
use crate::store::{Fields, RecordKey};

/// Activity kinds offered by the entry form, with their emoji.
pub const ACTIVITY_KINDS: [(&str, &str); 6] = [
    ("Running", "🏃"),
    ("Cycling", "🚴"),
    ("Walking", "🚶"),
    ("Yoga", "🧘"),
    ("Swimming", "🏊"),
    ("Gym", "💪"),
];

/// Moods offered by the entry form.
pub const MOODS: [&str; 8] = ["😊", "😃", "😌", "😎", "🤗", "💪", "🔥", "⚡"];

/// Mood recorded when none is chosen.
pub const DEFAULT_MOOD: &str = "😊";

/// Name shown for a place stored without one.
pub const UNNAMED_PLACE: &str = "Unnamed";

/// Emoji for a known activity kind, matched case-insensitively.
#[must_use]
pub fn activity_emoji(kind: &str) -> Option<&'static str> {
    ACTIVITY_KINDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(kind.trim()))
        .map(|(_, emoji)| *emoji)
}

/// The two record kinds and the collections they live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// An [`ActivityEntry`].
    Activity,
    /// A [`PlaceMarker`].
    Place,
}

impl RecordKind {
    /// Collection path used when none is configured.
    #[must_use]
    pub fn default_collection(self) -> &'static str {
        match self {
            Self::Activity => "activity_entries",
            Self::Place => "place_markers",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Activity => write!(f, "activity entry"),
            Self::Place => write!(f, "place marker"),
        }
    }
}

/// Behaviour shared by every record kind held in a synchronized collection.
pub trait JournalRecord: Clone + fmt::Debug + Send + Sync + 'static {
    /// Payload written when creating a record.
    type New: Serialize + Send + Sync;

    /// Payload merged into an existing record.
    type Patch: Serialize + Send + Sync;

    /// Which kind this is.
    const KIND: RecordKind;

    /// Older stored names, as `(current, older)` pairs. Writing the current
    /// name retires the older one.
    const LEGACY_FIELDS: &'static [(&'static str, &'static str)] = &[];

    /// Build a record from its stored field map.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be read even leniently.
    fn decode(id: RecordKey, fields: &Fields) -> Result<Self, serde_json::Error>;

    /// Store-assigned id.
    fn id(&self) -> &RecordKey;

    /// When the record was created, if known.
    fn timestamp(&self) -> Option<DateTime<Utc>>;

    /// Air-quality reading.
    fn aqi(&self) -> Aqi;

    /// Health category of the reading.
    fn category(&self) -> Category {
        self.aqi().category()
    }

    /// Duration in minutes, for kinds that have one.
    fn duration_minutes(&self) -> Option<u32> {
        None
    }
}

// ---------------------------------------------------------------------------
// Activity entries
// ---------------------------------------------------------------------------

/// A logged outdoor activity.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    /// Store-assigned id.
    pub id: RecordKey,
    /// When the entry was created.
    pub timestamp: Option<DateTime<Utc>>,
    /// What was done, e.g. "Running".
    pub activity_kind: String,
    /// Length of the activity.
    pub duration_minutes: Option<u32>,
    /// Where it happened.
    pub location_label: String,
    /// Air quality at the time.
    pub aqi: Aqi,
    /// Mood emoji.
    pub mood: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Opaque reference to an attached photo.
    pub photo_ref: Option<String>,
    /// Calories burned.
    pub calories: Option<u32>,
    /// Distance covered.
    pub distance_km: Option<f64>,
}

/// Stored activity map. Older entries used shorter field names; both forms
/// may coexist after an edit, and the current name wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredActivity {
    #[serde(default, deserialize_with = "lenient::timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, rename = "date", deserialize_with = "lenient::timestamp")]
    legacy_timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::text")]
    activity_kind: Option<String>,
    #[serde(default, rename = "activity", deserialize_with = "lenient::text")]
    legacy_activity_kind: Option<String>,
    #[serde(default, deserialize_with = "lenient::whole")]
    duration_minutes: Option<u32>,
    #[serde(default, rename = "duration", deserialize_with = "lenient::whole")]
    legacy_duration_minutes: Option<u32>,
    #[serde(default, deserialize_with = "lenient::text")]
    location_label: Option<String>,
    #[serde(default, rename = "location", deserialize_with = "lenient::text")]
    legacy_location_label: Option<String>,
    #[serde(default)]
    aqi: Aqi,
    #[serde(default, deserialize_with = "lenient::text")]
    mood: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    notes: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    photo_ref: Option<String>,
    #[serde(default, rename = "photo", deserialize_with = "lenient::text")]
    legacy_photo_ref: Option<String>,
    #[serde(default, deserialize_with = "lenient::whole")]
    calories: Option<u32>,
    #[serde(default, deserialize_with = "lenient::decimal")]
    distance_km: Option<f64>,
    #[serde(default, rename = "distance", deserialize_with = "lenient::decimal")]
    legacy_distance_km: Option<f64>,
}

impl ActivityEntry {
    /// Emoji of the activity kind, if it is one of [`ACTIVITY_KINDS`].
    #[must_use]
    pub fn activity_emoji(&self) -> Option<&'static str> {
        activity_emoji(&self.activity_kind)
    }
}

impl JournalRecord for ActivityEntry {
    type New = NewActivity;
    type Patch = ActivityPatch;

    const KIND: RecordKind = RecordKind::Activity;
    const LEGACY_FIELDS: &'static [(&'static str, &'static str)] = &[
        ("timestamp", "date"),
        ("activityKind", "activity"),
        ("durationMinutes", "duration"),
        ("locationLabel", "location"),
        ("photoRef", "photo"),
        ("distanceKm", "distance"),
    ];

    fn decode(id: RecordKey, fields: &Fields) -> Result<Self, serde_json::Error> {
        let stored: StoredActivity = serde_json::from_value(Value::Object(fields.clone()))?;
        Ok(Self {
            id,
            timestamp: stored.timestamp.or(stored.legacy_timestamp),
            activity_kind: stored
                .activity_kind
                .or(stored.legacy_activity_kind)
                .unwrap_or_default(),
            duration_minutes: stored.duration_minutes.or(stored.legacy_duration_minutes),
            location_label: stored
                .location_label
                .or(stored.legacy_location_label)
                .unwrap_or_default(),
            aqi: stored.aqi,
            mood: stored.mood,
            notes: stored.notes,
            photo_ref: stored.photo_ref.or(stored.legacy_photo_ref),
            calories: stored.calories,
            distance_km: stored.distance_km.or(stored.legacy_distance_km),
        })
    }

    fn id(&self) -> &RecordKey {
        &self.id
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn aqi(&self) -> Aqi {
        self.aqi
    }

    fn duration_minutes(&self) -> Option<u32> {
        self.duration_minutes
    }
}

/// A validated activity entry, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// What was done.
    pub activity_kind: String,
    /// Length of the activity; 0 when the entered text was not a number.
    pub duration_minutes: u32,
    /// Where it happened.
    pub location_label: String,
    /// Air quality at the time.
    pub aqi: Aqi,
    /// Mood emoji.
    pub mood: String,
    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Opaque photo reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,
    /// Calories burned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    /// Distance covered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Fields to change on an activity entry. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    /// New activity kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_kind: Option<String>,
    /// New duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    /// New location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_label: Option<String>,
    /// New reading.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aqi: Option<Aqi>,
    /// New mood.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    /// New notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Place markers
// ---------------------------------------------------------------------------

/// A pinned location with an air-quality reading.
///
/// `aqi_category` and `emoji` are always derived from `aqi`, whatever the
/// stored map says.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceMarker {
    /// Store-assigned id.
    pub id: RecordKey,
    /// Display name.
    pub name: String,
    /// Latitude and longitude as entered or captured, uninterpreted.
    pub coordinates: String,
    /// Location accuracy as reported by the location provider.
    pub accuracy_meters: Option<String>,
    /// Air quality at the place.
    pub aqi: Aqi,
    /// Category of `aqi`.
    pub aqi_category: Category,
    /// Emoji of `aqi_category`.
    pub emoji: &'static str,
    /// When the marker was created.
    pub timestamp: Option<DateTime<Utc>>,
    /// When the marker was last edited.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPlace {
    #[serde(default, deserialize_with = "lenient::text")]
    name: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    coordinates: Option<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    accuracy_meters: Option<String>,
    #[serde(default, rename = "accuracy", deserialize_with = "lenient::text")]
    legacy_accuracy: Option<String>,
    #[serde(default)]
    aqi: Aqi,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    updated_at: Option<DateTime<Utc>>,
}

impl PlaceMarker {
    /// A map directions link, when the coordinates are a `lat,lon` pair.
    #[must_use]
    pub fn directions_url(&self) -> Option<String> {
        let (lat, lon) = self.coordinates.split_once(',')?;
        let (lat, lon) = (lat.trim(), lon.trim());
        if lat.is_empty() || lon.is_empty() || lon.contains(',') {
            return None;
        }
        Some(format!(
            "https://www.google.com/maps/dir/?api=1&destination={lat},{lon}"
        ))
    }
}

impl JournalRecord for PlaceMarker {
    type New = NewPlace;
    type Patch = PlacePatch;

    const KIND: RecordKind = RecordKind::Place;
    const LEGACY_FIELDS: &'static [(&'static str, &'static str)] =
        &[("accuracyMeters", "accuracy")];

    fn decode(id: RecordKey, fields: &Fields) -> Result<Self, serde_json::Error> {
        let stored: StoredPlace = serde_json::from_value(Value::Object(fields.clone()))?;
        let aqi_category = stored.aqi.category();
        Ok(Self {
            id,
            name: stored.name.unwrap_or_else(|| UNNAMED_PLACE.to_string()),
            coordinates: stored.coordinates.unwrap_or_default(),
            accuracy_meters: stored.accuracy_meters.or(stored.legacy_accuracy),
            aqi: stored.aqi,
            aqi_category,
            emoji: aqi_category.emoji(),
            timestamp: stored.timestamp,
            updated_at: stored.updated_at,
        })
    }

    fn id(&self) -> &RecordKey {
        &self.id
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    fn aqi(&self) -> Aqi {
        self.aqi
    }
}

/// A validated place marker, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlace {
    /// Display name.
    pub name: String,
    /// Coordinates text.
    pub coordinates: String,
    /// Accuracy text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_meters: Option<String>,
    /// Air quality at the place.
    pub aqi: Aqi,
    /// Category of `aqi`.
    pub aqi_category: Category,
    /// Emoji of `aqi_category`.
    pub emoji: &'static str,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
}

/// An edit to a place marker. Leaves the creation timestamp alone.
///
/// A `None` accuracy clears the stored accuracy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacePatch {
    /// Display name.
    pub name: String,
    /// Coordinates text.
    pub coordinates: String,
    /// Accuracy text.
    pub accuracy_meters: Option<String>,
    /// Air quality at the place.
    pub aqi: Aqi,
    /// Category of `aqi`.
    pub aqi_category: Category,
    /// Emoji of `aqi_category`.
    pub emoji: &'static str,
    /// Edit time.
    pub updated_at: DateTime<Utc>,
}

/// Tolerant field readers for stored maps.
mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
        Option::<Value>::deserialize(deserializer)
    }

    /// Text, or a number rendered as text. Blank text reads as absent.
    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
        Ok(match value(deserializer)? {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    }

    /// A non-negative whole number, from a number or numeric text.
    pub fn whole<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        Ok(value(deserializer)?.as_ref().and_then(parse_whole))
    }

    /// A finite decimal, from a number or numeric text.
    pub fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        Ok(match value(deserializer)? {
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
            Some(Value::String(s)) => parse_decimal_text(&s),
            _ => None,
        })
    }

    /// An RFC 3339 string or epoch milliseconds.
    pub fn timestamp<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(match value(deserializer)? {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
            _ => None,
        })
    }

    fn parse_whole(value: &Value) -> Option<u32> {
        match value {
            Value::Number(n) => n.as_f64().and_then(whole_from_f64),
            Value::String(s) => parse_whole_text(s),
            _ => None,
        }
    }

    /// Parse entered text as a non-negative whole number, truncating decimals.
    pub(crate) fn parse_whole_text(text: &str) -> Option<u32> {
        text.trim().parse::<f64>().ok().and_then(whole_from_f64)
    }

    /// Parse entered text as a finite decimal.
    pub(crate) fn parse_decimal_text(text: &str) -> Option<f64> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn whole_from_f64(number: f64) -> Option<u32> {
        if number.is_finite() && number >= 0.0 && number <= f64::from(u32::MAX) {
            Some(number.trunc() as u32)
        } else {
            None
        }
    }
}

pub(crate) use lenient::{parse_decimal_text, parse_whole_text};
