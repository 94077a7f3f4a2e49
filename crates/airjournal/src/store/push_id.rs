//! Store key generation.
//!
//! Keys are 20 characters: 8 encode the creation millisecond, 12 are a
//! suffix. Both halves use an alphabet whose byte order matches its digit
//! order, so lexical key order is creation order.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};

use super::RecordKey;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_DIGITS: usize = 8;
const SUFFIX_DIGITS: usize = 12;

/// Generates strictly increasing store keys.
#[derive(Debug)]
pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

#[derive(Debug)]
struct PushState {
    last_millis: i64,
    suffix: [u8; SUFFIX_DIGITS],
    reseeds: u64,
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PushIdGenerator {
    /// Create a generator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PushState {
                last_millis: -1,
                suffix: [0; SUFFIX_DIGITS],
                reseeds: 0,
            }),
        }
    }

    /// Produce the next key for a record created at `now`.
    ///
    /// A clock that stalls or steps backwards keeps the previous millisecond
    /// and bumps the suffix instead.
    pub fn next_key(&self, now: DateTime<Utc>) -> RecordKey {
        let millis = now.timestamp_millis().max(0);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if millis > state.last_millis {
            state.last_millis = millis;
            state.reseeds += 1;
            state.suffix = seed_suffix(millis, state.reseeds);
        } else if !increment(&mut state.suffix) {
            state.last_millis += 1;
        }

        let mut key = String::with_capacity(TIME_DIGITS + SUFFIX_DIGITS);
        key.push_str(&encode_time(state.last_millis));
        key.extend(state.suffix.iter().map(|&digit| char::from(PUSH_CHARS[usize::from(digit)])));
        RecordKey::new(key)
    }
}

fn encode_time(mut millis: i64) -> String {
    let mut digits = [0u8; TIME_DIGITS];
    for slot in digits.iter_mut().rev() {
        // rem_euclid keeps the index within 0..64.
        let index = usize::try_from(millis.rem_euclid(64)).unwrap_or(0);
        *slot = PUSH_CHARS[index];
        millis /= 64;
    }
    digits.iter().map(|&b| char::from(b)).collect()
}

fn seed_suffix(millis: i64, reseeds: u64) -> [u8; SUFFIX_DIGITS] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&millis.to_le_bytes());
    hasher.update(&reseeds.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let digest = hasher.finalize();

    let mut suffix = [0u8; SUFFIX_DIGITS];
    for (slot, byte) in suffix.iter_mut().zip(digest.as_bytes()) {
        *slot = byte % 64;
    }
    // Leave headroom for increments within one millisecond.
    suffix[0] %= 32;
    suffix
}

/// Add one to the suffix. Returns `false` when it wrapped to all zeros.
fn increment(suffix: &mut [u8; SUFFIX_DIGITS]) -> bool {
    for digit in suffix.iter_mut().rev() {
        if *digit < 63 {
            *digit += 1;
            return true;
        }
        *digit = 0;
    }
    false
}
