//! Finds users who have been close to each other in space and time.
//!
//! Every unordered pair of users is considered once. A pair is skipped when
//! both users are already known to be close to someone. For a surviving pair
//! the source narrows the search to activity pairs whose bounding boxes and
//! time windows overlap, and only those activities' points are compared
//! all-against-all.

use std::{collections::BTreeSet, fmt::Debug};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use geo_types::Coord;

use crate::{
    data_types::common::UserId,
    error::Result,
    logln, logvbln,
    util::geo::{BoundingBox, GeoUtils},
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityRule {
    pub max_distance_m: f64,
    pub max_time_diff_s: i64,
}

impl Default for ProximityRule {
    fn default() -> Self {
        Self {
            max_distance_m: 50.0,
            max_time_diff_s: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedPoint {
    pub coord: Coord,
    pub date_time: NaiveDateTime,
}

/// Spatial and temporal extent of one activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityBounds<A> {
    pub activity_id: A,
    pub bbox: BoundingBox,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl<A> ActivityBounds<A> {
    pub fn overlaps(&self, other: &ActivityBounds<A>) -> bool {
        self.bbox.overlaps(&other.bbox) && self.end >= other.start && self.start <= other.end
    }
}

/// Overlapping `(first, second)` activity pairs, in input order.
pub fn overlapping_pairs<A: Clone>(
    first: &[ActivityBounds<A>],
    second: &[ActivityBounds<A>],
) -> Vec<(A, A)> {
    first
        .iter()
        .flat_map(|a| {
            second
                .iter()
                .filter(move |b| a.overlaps(b))
                .map(move |b| (a.activity_id.clone(), b.activity_id.clone()))
        })
        .collect()
}

/// Backend access needed by [`ProximityDetector`].
#[async_trait]
pub trait ProximitySource: Send {
    type ActivityId: Clone + Debug + Send + Sync;

    async fn user_ids(&mut self) -> Result<Vec<UserId>>;

    /// Activity pairs of the two users whose bounding boxes and time windows overlap.
    async fn candidate_activity_pairs(
        &mut self,
        first_user: &str,
        second_user: &str,
    ) -> Result<Vec<(Self::ActivityId, Self::ActivityId)>>;

    /// Points of one activity in recorded order.
    async fn activity_points(&mut self, activity_id: &Self::ActivityId) -> Result<Vec<TimedPoint>>;
}

/// True if some point of `first` and some point of `second` satisfy `rule`.
pub fn points_are_close(first: &[TimedPoint], second: &[TimedPoint], rule: &ProximityRule) -> bool {
    let first_coords: Vec<Coord> = first.iter().map(|p| p.coord).collect();
    let second_coords: Vec<Coord> = second.iter().map(|p| p.coord).collect();
    let distances = GeoUtils::distance_matrix_m(&first_coords, &second_coords);

    distances.iter().enumerate().any(|(i, row)| {
        row.iter().enumerate().any(|(j, distance)| {
            *distance <= rule.max_distance_m
                && (first[i].date_time - second[j].date_time).num_seconds().abs()
                    <= rule.max_time_diff_s
        })
    })
}

pub struct ProximityDetector {
    rule: ProximityRule,
}

impl ProximityDetector {
    const CC: &'static str = "Proximity";

    pub fn new(rule: ProximityRule) -> Self {
        Self { rule }
    }

    pub async fn find_close_users<S: ProximitySource>(
        &self,
        source: &mut S,
    ) -> Result<BTreeSet<UserId>> {
        let mut users = source.user_ids().await?;
        users.sort();

        let mut close_users: BTreeSet<UserId> = BTreeSet::new();

        for (index, first_user) in users.iter().enumerate() {
            logln!("Comparing user {} with other users", first_user);

            for second_user in &users[index + 1..] {
                if close_users.contains(first_user) && close_users.contains(second_user) {
                    continue;
                }

                if self.users_are_close(source, first_user, second_user).await? {
                    logln!("User {} and user {} have been close", first_user, second_user);
                    close_users.insert(first_user.clone());
                    close_users.insert(second_user.clone());
                }
            }
        }

        Ok(close_users)
    }

    async fn users_are_close<S: ProximitySource>(
        &self,
        source: &mut S,
        first_user: &str,
        second_user: &str,
    ) -> Result<bool> {
        let pairs = source
            .candidate_activity_pairs(first_user, second_user)
            .await?;
        logvbln!(
            "Users {} and {}: {} candidate activity pairs",
            first_user,
            second_user,
            pairs.len()
        );

        for (first_activity, second_activity) in pairs {
            let first_points = source.activity_points(&first_activity).await?;
            let second_points = source.activity_points(&second_activity).await?;

            if points_are_close(&first_points, &second_points, &self.rule) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
