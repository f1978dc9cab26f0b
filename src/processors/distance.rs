use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use geo_types::Coord;

use crate::{data_types::common::UserId, util::geo::GeoUtils};

/// A point of a labelled activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ModePoint<A> {
    pub activity_id: A,
    pub coord: Coord,
    pub date_time: NaiveDateTime,
    pub transportation_mode: String,
}

/// Kilometres per (calendar day, mode) for one user's points, in recorded order.
///
/// Only consecutive points of the same activity, mode and day form a segment.
pub fn daily_distance_by_mode<A: PartialEq>(
    points: &[ModePoint<A>],
) -> HashMap<(NaiveDate, String), f64> {
    let mut distances: HashMap<(NaiveDate, String), f64> = HashMap::new();

    for pair in points.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        let date = current.date_time.date();

        if date == prev.date_time.date()
            && current.transportation_mode == prev.transportation_mode
            && current.activity_id == prev.activity_id
        {
            *distances
                .entry((date, current.transportation_mode.clone()))
                .or_insert(0.0) += GeoUtils::haversine_km(prev.coord, current.coord);
        }
    }

    distances
}

/// Longest one-day distance per transportation mode and who travelled it.
#[derive(Debug, Default)]
pub struct ModeRecords {
    records: BTreeMap<String, (Option<UserId>, f64)>,
}

impl ModeRecords {
    /// Every known mode starts with no holder.
    pub fn new<I: IntoIterator<Item = String>>(modes: I) -> Self {
        Self {
            records: modes.into_iter().map(|m| (m, (None, 0.0))).collect(),
        }
    }

    pub fn add_user<A: PartialEq>(&mut self, user_id: &str, points: &[ModePoint<A>]) {
        let mut best_per_mode: HashMap<String, f64> = HashMap::new();
        for ((_, mode), distance) in daily_distance_by_mode(points) {
            let best = best_per_mode.entry(mode).or_insert(0.0);
            *best = best.max(distance);
        }

        for (mode, distance) in best_per_mode {
            let record = self.records.entry(mode).or_insert((None, 0.0));
            if distance > record.1 {
                *record = (Some(user_id.to_string()), distance);
            }
        }
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, &(Option<UserId>, f64))> {
        self.records.iter()
    }
}

/// Kilometres along `points`, counting a segment only if it ends inside `year`.
pub fn distance_in_year_km(points: &[(Coord, NaiveDateTime)], year: i32) -> f64 {
    points
        .windows(2)
        .filter(|pair| pair[1].1.year() == year)
        .map(|pair| GeoUtils::haversine_km(pair[0].0, pair[1].0))
        .sum()
}

pub fn any_within_radius<'a, I>(coords: I, center: Coord, radius_km: f64) -> bool
where
    I: IntoIterator<Item = &'a Coord>,
{
    coords
        .into_iter()
        .any(|c| GeoUtils::haversine_km(*c, center) <= radius_km)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::DateTimeUtils;

    fn mode_point(activity_id: i32, lat: f64, at: &str, mode: &str) -> ModePoint<i32> {
        ModePoint {
            activity_id,
            coord: GeoUtils::latlon(lat, 116.0),
            date_time: DateTimeUtils::parse(at).unwrap(),
            transportation_mode: mode.to_string(),
        }
    }

    #[test]
    fn test_segments_break_on_activity_and_day() {
        let points = vec![
            mode_point(1, 40.00, "2008-06-01 23:50:00", "walk"),
            mode_point(1, 40.01, "2008-06-01 23:55:00", "walk"),
            // New day: no segment from the previous point
            mode_point(1, 40.02, "2008-06-02 00:01:00", "walk"),
            // New activity: no segment
            mode_point(2, 40.50, "2008-06-02 09:00:00", "walk"),
            mode_point(2, 40.51, "2008-06-02 09:10:00", "walk"),
        ];

        let distances = daily_distance_by_mode(&points);
        let day1 = distances[&(NaiveDate::from_ymd_opt(2008, 6, 1).unwrap(), "walk".to_string())];
        let day2 = distances[&(NaiveDate::from_ymd_opt(2008, 6, 2).unwrap(), "walk".to_string())];

        assert!((day1 - 1.112).abs() < 0.01, "got {day1}");
        assert!((day2 - 1.112).abs() < 0.01, "got {day2}");
    }

    #[test]
    fn test_mode_records_keep_longest_day() {
        let mut records = ModeRecords::new(vec!["bus".to_string(), "walk".to_string()]);
        records.add_user(
            "010",
            &[
                mode_point(1, 40.0, "2008-06-01 10:00:00", "bus"),
                mode_point(1, 40.1, "2008-06-01 10:30:00", "bus"),
            ],
        );
        records.add_user(
            "020",
            &[
                mode_point(2, 40.0, "2008-06-01 10:00:00", "bus"),
                mode_point(2, 40.2, "2008-06-01 10:30:00", "bus"),
            ],
        );

        let collected: Vec<_> = records.records().collect();
        assert_eq!(collected[0].0, "bus");
        assert_eq!(collected[0].1 .0.as_deref(), Some("020"));
        assert_eq!(collected[1].0, "walk");
        assert_eq!(collected[1].1 .0, None);
    }

    #[test]
    fn test_distance_in_year_uses_segment_end() {
        let at = |s: &str| DateTimeUtils::parse(s).unwrap();
        let points = vec![
            (GeoUtils::latlon(40.0, 116.0), at("2007-12-31 23:59:00")),
            (GeoUtils::latlon(40.1, 116.0), at("2008-01-01 00:01:00")),
            (GeoUtils::latlon(40.2, 116.0), at("2009-01-01 00:01:00")),
        ];

        let km = distance_in_year_km(&points, 2008);
        assert!((km - 11.12).abs() < 0.05, "got {km}");
    }

    #[test]
    fn test_within_radius() {
        let forbidden_city = GeoUtils::latlon(39.916, 116.397);
        let near = [GeoUtils::latlon(39.92, 116.40)];
        let far = [GeoUtils::latlon(40.0, 116.3)];

        assert!(any_within_radius(&near, forbidden_city, 1.0));
        assert!(!any_within_radius(&far, forbidden_city, 1.0));
    }
}
