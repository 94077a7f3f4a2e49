//! `airjournal` - An air-quality annotated activity and place journal
//!
//! This library provides the core of the journal: AQI classification,
//! live-synchronized record collections over a pluggable store, summary
//! statistics, and the form logic that turns user input into validated
//! writes.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod aggregate;
pub mod aqi;
pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod journal;
pub mod logging;
pub mod record;
pub mod store;
pub mod sync;

pub use aggregate::JournalStats;
pub use aqi::{category_midpoint, classify, Aqi, Category};
pub use config::Config;
pub use error::{Error, Result};
pub use form::{ActivityDraft, AqiField, PlaceDraft};
pub use journal::{Journal, JournalSummary};
pub use logging::init_logging;
pub use record::{ActivityEntry, ActivityPatch, NewActivity, NewPlace, PlaceMarker, PlacePatch};
pub use store::{MemoryStore, RecordKey, RecordStore, SqliteStore, StorageStats, Subscription};
pub use sync::{Snapshot, SyncedCollection};
