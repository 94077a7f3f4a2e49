//! Summary statistics over a snapshot.
//!
//! Every function here is pure and total: the same snapshot always yields
//! the same answer, and nothing is cached between calls.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::record::JournalRecord;
use crate::sync::Snapshot;

/// Default length of the recent-activity window.
pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// Default AQI at or below which air counts as good.
pub const DEFAULT_BEST_AIR_THRESHOLD: u16 = 100;

/// Number of records.
#[must_use]
pub fn total_count<R: JournalRecord>(snapshot: &Snapshot<R>) -> usize {
    snapshot.len()
}

/// Records created within the last `window_days` days.
#[must_use]
pub fn window_count<R: JournalRecord>(snapshot: &Snapshot<R>, window_days: u32) -> usize {
    window_count_at(snapshot, window_days, Utc::now())
}

/// Records whose timestamp lies in `[now - window_days, now]`.
///
/// Records without a timestamp are never counted.
#[must_use]
pub fn window_count_at<R: JournalRecord>(
    snapshot: &Snapshot<R>,
    window_days: u32,
    now: DateTime<Utc>,
) -> usize {
    let start = now - Duration::days(i64::from(window_days));
    snapshot
        .iter()
        .filter_map(JournalRecord::timestamp)
        .filter(|ts| *ts >= start && *ts <= now)
        .count()
}

/// Sum of durations; missing or unreadable durations count as 0.
#[must_use]
pub fn total_duration_minutes<R: JournalRecord>(snapshot: &Snapshot<R>) -> u64 {
    snapshot
        .iter()
        .map(|record| u64::from(record.duration_minutes().unwrap_or(0)))
        .sum()
}

/// Records with `aqi <= threshold`.
#[must_use]
pub fn best_air_quality_count<R: JournalRecord>(snapshot: &Snapshot<R>, threshold: u16) -> usize {
    snapshot
        .iter()
        .filter(|record| record.aqi().value() <= threshold)
        .count()
}

/// Mean AQI, or `None` for an empty snapshot.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_aqi<R: JournalRecord>(snapshot: &Snapshot<R>) -> Option<f64> {
    if snapshot.is_empty() {
        return None;
    }
    let sum: u64 = snapshot
        .iter()
        .map(|record| u64::from(record.aqi().value()))
        .sum();
    Some(sum as f64 / snapshot.len() as f64)
}

/// All statistics for one snapshot, computed in one pass of `now`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct JournalStats {
    /// Number of records.
    pub total_count: usize,
    /// Records inside the window.
    pub window_count: usize,
    /// Window length used.
    pub window_days: u32,
    /// Sum of durations in minutes.
    pub total_duration_minutes: u64,
    /// Records at or below the threshold.
    pub best_air_count: usize,
    /// Threshold used.
    pub best_air_threshold: u16,
    /// Mean AQI.
    pub average_aqi: Option<f64>,
}

impl JournalStats {
    /// Compute statistics as of now.
    #[must_use]
    pub fn compute<R: JournalRecord>(
        snapshot: &Snapshot<R>,
        window_days: u32,
        best_air_threshold: u16,
    ) -> Self {
        Self::compute_at(snapshot, window_days, best_air_threshold, Utc::now())
    }

    /// Compute statistics as of `now`.
    #[must_use]
    pub fn compute_at<R: JournalRecord>(
        snapshot: &Snapshot<R>,
        window_days: u32,
        best_air_threshold: u16,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            total_count: total_count(snapshot),
            window_count: window_count_at(snapshot, window_days, now),
            window_days,
            total_duration_minutes: total_duration_minutes(snapshot),
            best_air_count: best_air_quality_count(snapshot, best_air_threshold),
            best_air_threshold,
            average_aqi: average_aqi(snapshot),
        }
    }

    /// Total duration in whole hours, rounded down.
    #[must_use]
    pub fn total_hours(&self) -> u64 {
        self.total_duration_minutes / 60
    }
}
