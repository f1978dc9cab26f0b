use chrono::NaiveDateTime;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub has_labels: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: i32,
    pub user_id: String,
    pub transportation_mode: Option<String>,
    pub start_date_time: NaiveDateTime,
    pub end_date_time: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackPointRow {
    pub id: i32,
    pub activity_id: i32,
    pub lat: f64,
    pub lon: f64,
    pub altitude: i32,
    pub date_days: f64,
    pub date_time: NaiveDateTime,
}

/// Points of labelled activities, in storage order, for per-day distances.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ModePointRow {
    pub activity_id: i32,
    pub lat: f64,
    pub lon: f64,
    pub date_time: NaiveDateTime,
    pub transportation_mode: String,
}
