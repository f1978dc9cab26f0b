use std::collections::HashMap;

use crate::data_types::common::{UserId, ALTITUDE_UNKNOWN, FEET_TO_METERS};

/// Metres climbed over one activity's altitudes (feet, in recorded order).
///
/// Unknown altitudes are dropped before pairing, so they never take part in
/// a comparison on either side.
pub fn altitude_gain_m<I>(altitudes: I) -> f64
where
    I: IntoIterator<Item = i32>,
{
    let mut previous: Option<i64> = None;
    let mut gained_feet: i64 = 0;

    for altitude in altitudes.into_iter().filter(|a| *a != ALTITUDE_UNKNOWN) {
        let altitude = i64::from(altitude);
        if let Some(prev) = previous {
            if altitude > prev {
                gained_feet += altitude - prev;
            }
        }
        previous = Some(altitude);
    }

    gained_feet as f64 * FEET_TO_METERS
}

/// Per-user altitude totals across activities.
#[derive(Debug, Default)]
pub struct AltitudeLeaderboard {
    gained: HashMap<UserId, f64>,
}

impl AltitudeLeaderboard {
    pub fn add_activity<I>(&mut self, user_id: &str, altitudes: I)
    where
        I: IntoIterator<Item = i32>,
    {
        let gain = altitude_gain_m(altitudes);
        if gain > 0.0 {
            *self.gained.entry(user_id.to_string()).or_insert(0.0) += gain;
        }
    }

    /// Highest totals first, ties by user id.
    pub fn top(&self, limit: usize) -> Vec<(UserId, f64)> {
        let mut totals: Vec<(UserId, f64)> = self
            .gained
            .iter()
            .map(|(user, gain)| (user.clone(), *gain))
            .collect();
        totals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        totals.truncate(limit);

        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gain_counts_only_climbs() {
        let gain = altitude_gain_m(vec![100, 110, 105, 120]);
        assert!((gain - 25.0 * FEET_TO_METERS).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_altitude_excluded_from_both_sides() {
        // Without filtering, 100 -> -777 -> 200 would add 977 feet.
        let gain = altitude_gain_m(vec![100, -777, 200]);
        assert!((gain - 100.0 * FEET_TO_METERS).abs() < 1e-9);

        assert_eq!(altitude_gain_m(vec![-777, 50]), 0.0);
        assert_eq!(altitude_gain_m(vec![50, -777]), 0.0);
    }

    #[test]
    fn test_gain_spanning_whole_i32_range() {
        let gain = altitude_gain_m(vec![-2_000_000_000, 2_000_000_000]);
        assert!((gain - 4_000_000_000.0 * FEET_TO_METERS).abs() < 1e-3);
    }

    #[test]
    fn test_leaderboard_orders_descending() {
        let mut board = AltitudeLeaderboard::default();
        board.add_activity("001", vec![0, 10]);
        board.add_activity("002", vec![0, 30]);
        board.add_activity("001", vec![0, 10]);
        board.add_activity("003", vec![10, 0]);

        let top = board.top(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].0, "002");
        assert_eq!(top[1].0, "001");
        assert!((top[1].1 - 20.0 * FEET_TO_METERS).abs() < 1e-9);
    }
}
