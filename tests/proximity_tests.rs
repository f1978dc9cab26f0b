//! Close-user detection through an in-memory activity source.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use geolife_db::{
    error::Result,
    processors::proximity::{
        overlapping_pairs, ActivityBounds, ProximityDetector, ProximityRule, ProximitySource,
        TimedPoint,
    },
    util::{geo::GeoUtils, time::DateTimeUtils},
};

struct Activity {
    user: &'static str,
    points: Vec<TimedPoint>,
}

/// Source that keeps activities in memory and counts point fetches.
#[derive(Default)]
struct InMemorySource {
    activities: HashMap<u32, Activity>,
    fetched: Vec<u32>,
}

impl InMemorySource {
    fn add(&mut self, id: u32, user: &'static str, points: &[(f64, f64, &str)]) {
        let points = points
            .iter()
            .map(|(lat, lon, at)| TimedPoint {
                coord: GeoUtils::latlon(*lat, *lon),
                date_time: DateTimeUtils::parse(at).unwrap(),
            })
            .collect();
        self.activities.insert(id, Activity { user, points });
    }

    fn bounds_of(&self, user: &str) -> Vec<ActivityBounds<u32>> {
        let mut ids: Vec<&u32> = self
            .activities
            .iter()
            .filter(|(_, a)| a.user == user)
            .map(|(id, _)| id)
            .collect();
        ids.sort();

        ids.into_iter()
            .map(|id| {
                let points = &self.activities[id].points;
                let coords: Vec<_> = points.iter().map(|p| p.coord).collect();
                ActivityBounds {
                    activity_id: *id,
                    bbox: GeoUtils::get_bounding_box(&coords).unwrap(),
                    start: points.first().unwrap().date_time,
                    end: points.last().unwrap().date_time,
                }
            })
            .collect()
    }
}

#[async_trait]
impl ProximitySource for InMemorySource {
    type ActivityId = u32;

    async fn user_ids(&mut self) -> Result<Vec<String>> {
        let users: BTreeSet<&str> = self.activities.values().map(|a| a.user).collect();
        Ok(users.into_iter().map(str::to_string).collect())
    }

    async fn candidate_activity_pairs(
        &mut self,
        first_user: &str,
        second_user: &str,
    ) -> Result<Vec<(u32, u32)>> {
        Ok(overlapping_pairs(
            &self.bounds_of(first_user),
            &self.bounds_of(second_user),
        ))
    }

    async fn activity_points(&mut self, activity_id: &u32) -> Result<Vec<TimedPoint>> {
        self.fetched.push(*activity_id);
        Ok(self.activities[activity_id].points.clone())
    }
}

#[tokio::test]
async fn test_users_close_in_space_and_time() {
    let mut source = InMemorySource::default();
    source.add(
        1,
        "000",
        &[
            (39.9000, 116.4000, "2008-10-23 10:00:00"),
            (39.9100, 116.4100, "2008-10-23 10:10:00"),
        ],
    );
    source.add(
        2,
        "001",
        &[
            (39.9050, 116.4050, "2008-10-23 10:05:00"),
            // ~11 m and 10 s from user 000's last point
            (39.9101, 116.4100, "2008-10-23 10:10:10"),
        ],
    );

    let close = ProximityDetector::new(ProximityRule::default())
        .find_close_users(&mut source)
        .await
        .unwrap();

    assert_eq!(
        close.into_iter().collect::<Vec<_>>(),
        vec!["000".to_string(), "001".to_string()]
    );
}

#[tokio::test]
async fn test_disjoint_boxes_never_fetch_points() {
    let mut source = InMemorySource::default();
    source.add(
        1,
        "000",
        &[
            (39.90, 116.40, "2008-10-23 10:00:00"),
            (39.91, 116.41, "2008-10-23 10:10:00"),
        ],
    );
    // Same time window, different city
    source.add(
        2,
        "001",
        &[
            (31.20, 121.40, "2008-10-23 10:00:00"),
            (31.21, 121.41, "2008-10-23 10:10:00"),
        ],
    );

    let close = ProximityDetector::new(ProximityRule::default())
        .find_close_users(&mut source)
        .await
        .unwrap();

    assert!(close.is_empty());
    assert!(source.fetched.is_empty());
}

#[tokio::test]
async fn test_disjoint_windows_never_fetch_points() {
    let mut source = InMemorySource::default();
    source.add(1, "000", &[(39.90, 116.40, "2008-10-23 10:00:00")]);
    source.add(2, "001", &[(39.90, 116.40, "2008-10-24 10:00:00")]);

    let close = ProximityDetector::new(ProximityRule::default())
        .find_close_users(&mut source)
        .await
        .unwrap();

    assert!(close.is_empty());
    assert!(source.fetched.is_empty());
}

#[tokio::test]
async fn test_confirmed_pair_stops_scanning_activities() {
    let mut source = InMemorySource::default();
    source.add(1, "000", &[(39.90, 116.40, "2008-10-23 10:00:00")]);
    source.add(2, "000", &[(39.90, 116.40, "2008-10-23 10:00:00")]);
    source.add(
        3,
        "001",
        &[
            (39.90, 116.40, "2008-10-23 09:59:50"),
            (39.90, 116.40, "2008-10-23 10:00:05"),
        ],
    );

    let close = ProximityDetector::new(ProximityRule::default())
        .find_close_users(&mut source)
        .await
        .unwrap();

    assert_eq!(close.len(), 2);
    // First candidate pair (1, 3) already confirms the users
    assert_eq!(source.fetched, vec![1, 3]);
}
