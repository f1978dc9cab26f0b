use chrono::NaiveDateTime;
use mongodb::bson::{oid::ObjectId, DateTime};
use serde_derive::{Deserialize, Serialize};

use super::{
    common::UserId,
    geolife::{ActivityRecord, TrajectoryPoint},
};

pub fn to_bson_datetime(value: NaiveDateTime) -> DateTime {
    DateTime::from_millis(value.and_utc().timestamp_millis())
}

pub fn from_bson_datetime(value: DateTime) -> Option<NaiveDateTime> {
    chrono::DateTime::from_timestamp_millis(value.timestamp_millis()).map(|dt| dt.naive_utc())
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserDoc {
    pub _id: UserId,
    pub has_labels: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActivityDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: UserId,
    pub transportation_mode: Option<String>,
    pub start_date_time: DateTime,
    pub end_date_time: DateTime,
}

impl From<&ActivityRecord> for ActivityDoc {
    fn from(activity: &ActivityRecord) -> Self {
        Self {
            id: None,
            user_id: activity.user_id.clone(),
            transportation_mode: activity.transportation_mode.clone(),
            start_date_time: to_bson_datetime(activity.start_date_time),
            end_date_time: to_bson_datetime(activity.end_date_time),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackPointDoc {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub activity_id: ObjectId,
    pub lat: f64,
    pub lon: f64,
    pub altitude: i32,
    pub date_days: f64,
    pub date_time: DateTime,
}

impl TrackPointDoc {
    pub fn new(activity_id: ObjectId, point: &TrajectoryPoint) -> Self {
        Self {
            id: None,
            activity_id,
            lat: point.lat,
            lon: point.lon,
            altitude: point.altitude,
            date_days: point.date_days,
            date_time: to_bson_datetime(point.date_time),
        }
    }
}

/// An activity joined with (a projection of) its track points through `$lookup`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityJoin<P> {
    pub _id: ObjectId,
    pub user_id: UserId,
    #[serde(default = "Vec::new")]
    pub track_points: Vec<P>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AltitudeOnly {
    pub altitude: i32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeOnly {
    pub date_time: DateTime,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PositionOnly {
    pub lat: f64,
    pub lon: f64,
    pub date_time: DateTime,
}

/// Per-activity extent computed by the bounds pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityBoundsDoc {
    pub _id: ObjectId,
    pub start_date_time: DateTime,
    pub end_date_time: DateTime,
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}
