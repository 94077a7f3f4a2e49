//! Draft validation.
//!
//! Drafts hold what the user typed, as text. Validating a draft either yields
//! a well-formed payload for [`SyncedCollection`](crate::sync::SyncedCollection)
//! or an [`Error::Validation`] naming the first missing required field.
//! Numeric text that does not parse falls back to a default instead of
//! failing.

use chrono::{DateTime, Utc};

use crate::aqi::{Aqi, Category};
use crate::error::{Error, Result};
use crate::record::{
    parse_decimal_text, parse_whole_text, NewActivity, NewPlace, PlaceMarker, PlacePatch,
    DEFAULT_MOOD,
};

/// The coupled AQI number and category inputs.
///
/// Typing a number and picking a category are separate operations. Each one
/// is authoritative for its own action and never triggers the other, so the
/// two inputs cannot chase each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AqiField {
    text: String,
    value: Aqi,
    category: Category,
}

impl Default for AqiField {
    fn default() -> Self {
        Self::from_aqi(Aqi::DEFAULT)
    }
}

impl AqiField {
    /// Start from a known reading.
    #[must_use]
    pub fn from_aqi(aqi: Aqi) -> Self {
        Self {
            text: aqi.to_string(),
            value: aqi,
            category: aqi.category(),
        }
    }

    /// The user typed into the number input.
    ///
    /// The text is kept as typed; the reading is parsed leniently and the
    /// category follows it. Returns the new category.
    pub fn set_text(&mut self, text: impl Into<String>) -> Category {
        self.text = text.into();
        self.value = Aqi::parse_lenient(&self.text);
        self.category = self.value.category();
        self.category
    }

    /// The user picked a category directly.
    ///
    /// The reading becomes the category's midpoint. Returns the new reading.
    pub fn select_category(&mut self, category: Category) -> Aqi {
        self.value = category.midpoint();
        self.text = self.value.to_string();
        self.category = category;
        self.value
    }

    /// Text shown in the number input.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The reading that will be saved.
    #[must_use]
    pub fn value(&self) -> Aqi {
        self.value
    }

    /// The category shown as selected.
    #[must_use]
    pub fn category(&self) -> Category {
        self.category
    }
}

/// Trimmed text, or `None` when blank.
fn non_blank(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn required<'a>(text: &'a str, field: &'static str) -> Result<&'a str> {
    non_blank(text).ok_or_else(|| Error::missing(field))
}

/// An activity entry as typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityDraft {
    /// Activity kind.
    pub activity_kind: String,
    /// Duration in minutes, as typed.
    pub duration: String,
    /// Where it happened.
    pub location_label: String,
    /// Reading and category.
    pub aqi: AqiField,
    /// Mood emoji.
    pub mood: String,
    /// Free-form notes.
    pub notes: String,
    /// Photo reference from the camera provider.
    pub photo_ref: Option<String>,
    /// Calories, as typed.
    pub calories: String,
    /// Distance in kilometres, as typed.
    pub distance: String,
}

impl Default for ActivityDraft {
    fn default() -> Self {
        Self {
            activity_kind: String::new(),
            duration: String::new(),
            location_label: String::new(),
            aqi: AqiField::default(),
            mood: DEFAULT_MOOD.to_string(),
            notes: String::new(),
            photo_ref: None,
            calories: String::new(),
            distance: String::new(),
        }
    }
}

impl ActivityDraft {
    /// Validate as of now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first missing required
    /// field, checked in the order `activityKind`, `durationMinutes`,
    /// `locationLabel`.
    pub fn validate(&self) -> Result<NewActivity> {
        self.validate_at(Utc::now())
    }

    /// Validate, stamping the entry with `now`.
    ///
    /// # Errors
    ///
    /// See [`ActivityDraft::validate`].
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<NewActivity> {
        let activity_kind = required(&self.activity_kind, "activityKind")?;
        let duration = required(&self.duration, "durationMinutes")?;
        let location_label = required(&self.location_label, "locationLabel")?;

        Ok(NewActivity {
            timestamp: now,
            activity_kind: activity_kind.to_string(),
            duration_minutes: parse_whole_text(duration).unwrap_or(0),
            location_label: location_label.to_string(),
            aqi: self.aqi.value(),
            mood: non_blank(&self.mood).unwrap_or(DEFAULT_MOOD).to_string(),
            notes: non_blank(&self.notes).map(str::to_string),
            photo_ref: self
                .photo_ref
                .as_deref()
                .and_then(non_blank)
                .map(str::to_string),
            calories: parse_whole_text(&self.calories),
            distance_km: parse_decimal_text(&self.distance),
        })
    }

    /// Clear every field, as after a successful save.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A place marker as typed or captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceDraft {
    /// Display name.
    pub name: String,
    /// Coordinates text.
    pub coordinates: String,
    /// Accuracy text.
    pub accuracy_meters: String,
    /// Reading and category.
    pub aqi: AqiField,
}

impl PlaceDraft {
    /// Prefill a draft for editing an existing marker.
    #[must_use]
    pub fn from_marker(marker: &PlaceMarker) -> Self {
        Self {
            name: marker.name.clone(),
            coordinates: marker.coordinates.clone(),
            accuracy_meters: marker.accuracy_meters.clone().unwrap_or_default(),
            aqi: AqiField::from_aqi(marker.aqi),
        }
    }

    /// Fill the location from a position fix.
    pub fn set_position(&mut self, latitude: f64, longitude: f64, accuracy: Option<f64>) {
        self.coordinates = format!("{latitude}, {longitude}");
        self.accuracy_meters = format!("{:.2} meter", accuracy.unwrap_or(0.0));
    }

    fn checked(&self) -> Result<(&str, &str)> {
        let name = required(&self.name, "name")?;
        let coordinates = required(&self.coordinates, "coordinates")?;
        Ok((name, coordinates))
    }

    /// Validate a new marker as of now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming `name` or `coordinates`.
    pub fn validate(&self) -> Result<NewPlace> {
        self.validate_at(Utc::now())
    }

    /// Validate a new marker created at `now`.
    ///
    /// # Errors
    ///
    /// See [`PlaceDraft::validate`].
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<NewPlace> {
        let (name, coordinates) = self.checked()?;
        let aqi = self.aqi.value();
        Ok(NewPlace {
            name: name.to_string(),
            coordinates: coordinates.to_string(),
            accuracy_meters: non_blank(&self.accuracy_meters).map(str::to_string),
            aqi,
            aqi_category: aqi.category(),
            emoji: aqi.category().emoji(),
            timestamp: now,
        })
    }

    /// Validate an edit to an existing marker, stamped at `now`.
    ///
    /// # Errors
    ///
    /// See [`PlaceDraft::validate`].
    pub fn validate_patch_at(&self, now: DateTime<Utc>) -> Result<PlacePatch> {
        let (name, coordinates) = self.checked()?;
        let aqi = self.aqi.value();
        Ok(PlacePatch {
            name: name.to_string(),
            coordinates: coordinates.to_string(),
            accuracy_meters: non_blank(&self.accuracy_meters).map(str::to_string),
            aqi,
            aqi_category: aqi.category(),
            emoji: aqi.category().emoji(),
            updated_at: now,
        })
    }

    /// Validate an edit as of now.
    ///
    /// # Errors
    ///
    /// See [`PlaceDraft::validate`].
    pub fn validate_patch(&self) -> Result<PlacePatch> {
        self.validate_patch_at(Utc::now())
    }

    /// Clear every field.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
