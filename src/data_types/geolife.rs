//! Records parsed from the Geolife flat files, before they reach a backend.

use chrono::NaiveDateTime;

use super::common::UserId;

/// One GPS fix from a `.plt` file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryPoint {
    pub lat: f64,
    pub lon: f64,
    pub altitude: i32,
    pub date_days: f64,
    /// `"<date> <time>"` exactly as read.
    pub date_time_str: String,
    pub date_time: NaiveDateTime,
}

/// One row of `labels.txt` with its boundaries normalised to `YYYY-MM-DD HH:MM:SS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub start_date_time: String,
    pub end_date_time: String,
    pub transportation_mode: String,
}

/// An activity built from one trajectory file.
#[derive(Debug, Clone)]
pub struct ActivityRecord {
    pub user_id: UserId,
    pub transportation_mode: Option<String>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
    pub track_points: Vec<TrajectoryPoint>,
}

#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: UserId,
    pub has_labels: bool,
    pub activities: Vec<ActivityRecord>,
}

impl UserRecord {
    pub fn track_point_count(&self) -> usize {
        self.activities.iter().map(|a| a.track_points.len()).sum()
    }
}

/// Totals written by one ingestion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionSummary {
    pub users: u64,
    pub activities: u64,
    pub track_points: u64,
    pub skipped_files: u64,
}

impl IngestionSummary {
    pub fn add_user(&mut self, user: &UserRecord) {
        self.users += 1;
        self.activities += user.activities.len() as u64;
        self.track_points += user.track_point_count() as u64;
    }
}
