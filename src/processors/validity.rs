//! Invalid activity detection.
//!
//! One rule for both backends: a gap of at least five minutes between
//! consecutive points, compared by absolute value so out-of-order timestamps
//! count too. The relational task 11 query applies the same `>= 300` seconds.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::data_types::common::UserId;

/// Consecutive points this far apart (or more) make an activity invalid.
pub const INVALID_GAP_MINUTES: i64 = 5;

pub fn is_invalid_activity(times: &[NaiveDateTime]) -> bool {
    times
        .windows(2)
        .any(|pair| (pair[1] - pair[0]).num_seconds().abs() >= INVALID_GAP_MINUTES * 60)
}

/// Invalid activity count per user, users with none omitted.
#[derive(Debug, Default)]
pub struct InvalidActivityCounter {
    counts: BTreeMap<UserId, u64>,
}

impl InvalidActivityCounter {
    pub fn add_activity(&mut self, user_id: &str, times: &[NaiveDateTime]) {
        if is_invalid_activity(times) {
            *self.counts.entry(user_id.to_string()).or_insert(0) += 1;
        }
    }

    pub fn counts(&self) -> &BTreeMap<UserId, u64> {
        &self.counts
    }
}
