//! Relational backend: `user`, `activity` and `track_point` tables in MySQL.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{Connection, MySql, MySqlConnection, QueryBuilder};

use crate::{
    data_types::{
        geolife::{IngestionSummary, UserRecord},
        relational::{ActivityRow, ModePointRow, TrackPointRow, UserRow},
        report::TaskReport,
    },
    error::{GeolifeError, Result},
    ingestion::DatasetReader,
    logln,
    processors::{
        distance::{ModePoint, ModeRecords},
        proximity::{ProximityDetector, ProximityRule, ProximitySource, TimedPoint},
    },
    util::{geo::GeoUtils, table::Table, time::DateTimeUtils},
};

const CREATE_USER: &str = "
    CREATE TABLE IF NOT EXISTS user (
        id VARCHAR(50) NOT NULL PRIMARY KEY,
        has_labels TINYINT(1) NOT NULL
    )";

const CREATE_ACTIVITY: &str = "
    CREATE TABLE IF NOT EXISTS activity (
        id INT AUTO_INCREMENT PRIMARY KEY,
        user_id VARCHAR(50) NOT NULL,
        transportation_mode VARCHAR(100),
        start_date_time DATETIME NOT NULL,
        end_date_time DATETIME NOT NULL,
        FOREIGN KEY (user_id) REFERENCES user(id) ON DELETE CASCADE
    )";

const CREATE_TRACK_POINT: &str = "
    CREATE TABLE IF NOT EXISTS track_point (
        id INT AUTO_INCREMENT PRIMARY KEY,
        activity_id INT NOT NULL,
        lat DOUBLE NOT NULL,
        lon DOUBLE NOT NULL,
        altitude INT NOT NULL,
        date_days DOUBLE NOT NULL,
        date_time DATETIME NOT NULL,
        FOREIGN KEY (activity_id) REFERENCES activity(id) ON DELETE CASCADE
    )";

/// Tasks runnable against the relational schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlTask {
    Counts,
    TrackPointsPerUser,
    TopActivityUsers,
    BusUsers,
    TopModeVariety,
    DuplicateActivities,
    NextDayUserCount,
    NextDayActivities,
    CloseUsers,
    AltitudeGain,
    LongestDailyDistance,
    InvalidActivities,
    FavouriteMode,
}

impl SqlTask {
    pub const ALL: [SqlTask; 13] = [
        SqlTask::Counts,
        SqlTask::TrackPointsPerUser,
        SqlTask::TopActivityUsers,
        SqlTask::BusUsers,
        SqlTask::TopModeVariety,
        SqlTask::DuplicateActivities,
        SqlTask::NextDayUserCount,
        SqlTask::NextDayActivities,
        SqlTask::CloseUsers,
        SqlTask::AltitudeGain,
        SqlTask::LongestDailyDistance,
        SqlTask::InvalidActivities,
        SqlTask::FavouriteMode,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SqlTask::Counts => "1",
            SqlTask::TrackPointsPerUser => "2",
            SqlTask::TopActivityUsers => "3",
            SqlTask::BusUsers => "4",
            SqlTask::TopModeVariety => "5",
            SqlTask::DuplicateActivities => "6",
            SqlTask::NextDayUserCount => "7a",
            SqlTask::NextDayActivities => "7b",
            SqlTask::CloseUsers => "8",
            SqlTask::AltitudeGain => "9",
            SqlTask::LongestDailyDistance => "10",
            SqlTask::InvalidActivities => "11",
            SqlTask::FavouriteMode => "12",
        }
    }
}

impl FromStr for SqlTask {
    type Err = GeolifeError;

    fn from_str(s: &str) -> Result<Self> {
        SqlTask::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GeolifeError::UnknownTask(s.to_string()))
    }
}

pub struct GeolifeSql {
    conn: MySqlConnection,
}

impl GeolifeSql {
    const CC: &'static str = "MySql";

    pub async fn connect(url: &str) -> Result<Self> {
        let conn = MySqlConnection::connect(url).await?;
        Ok(Self { conn })
    }

    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }

    /// Drop and recreate the three tables.
    pub async fn reset_schema(&mut self) -> Result<()> {
        for table in ["track_point", "activity", "user"] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(&mut self.conn)
                .await?;
        }

        for statement in [CREATE_USER, CREATE_ACTIVITY, CREATE_TRACK_POINT] {
            sqlx::query(statement).execute(&mut self.conn).await?;
        }

        logln!("Schema recreated");
        Ok(())
    }

    pub async fn table_names(&mut self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SHOW TABLES")
            .fetch_all(&mut self.conn)
            .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Insert one user with all of its activities and points in one transaction.
    pub async fn insert_user(&mut self, user: &UserRecord) -> Result<()> {
        let mut tx = self.conn.begin().await?;

        sqlx::query("INSERT INTO user (id, has_labels) VALUES (?, ?)")
            .bind(&user.id)
            .bind(user.has_labels)
            .execute(&mut *tx)
            .await?;

        for activity in &user.activities {
            let activity_id = sqlx::query(
                "INSERT INTO activity
                 (user_id, transportation_mode, start_date_time, end_date_time)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&activity.user_id)
            .bind(&activity.transportation_mode)
            .bind(activity.start_date_time)
            .bind(activity.end_date_time)
            .execute(&mut *tx)
            .await?
            .last_insert_id();

            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO track_point (activity_id, lat, lon, altitude, date_days, date_time) ",
            );
            builder.push_values(&activity.track_points, |mut row, point| {
                row.push_bind(activity_id)
                    .push_bind(point.lat)
                    .push_bind(point.lon)
                    .push_bind(point.altitude)
                    .push_bind(point.date_days)
                    .push_bind(point.date_time);
            });
            builder.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Reset the schema and load the whole dataset.
    pub async fn ingest(&mut self, reader: &DatasetReader) -> Result<IngestionSummary> {
        self.reset_schema().await?;
        let tables = self.table_names().await?;
        logln!("Tables: {:?}", tables);

        let labeled = reader.labeled_ids()?;
        let mut summary = IngestionSummary::default();

        for user_id in reader.user_ids()? {
            logln!("Processing user {}", user_id);
            let read = reader.read_user(&user_id, labeled.contains(&user_id))?;

            self.insert_user(&read.user).await?;
            summary.add_user(&read.user);
            summary.skipped_files += read.skipped_files;
        }

        logln!("Ingestion finished: {:?}", summary);
        Ok(summary)
    }

    /// `(users, activities, track points)`
    pub async fn counts(&mut self) -> Result<(i64, i64, i64)> {
        let counts = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM user),
                    (SELECT COUNT(*) FROM activity),
                    (SELECT COUNT(*) FROM track_point)",
        )
        .fetch_one(&mut self.conn)
        .await?;

        Ok(counts)
    }

    /// First ten rows of every table.
    pub async fn show(&mut self) -> Result<Vec<TaskReport>> {
        let users: Vec<UserRow> = sqlx::query_as("SELECT id, has_labels FROM user LIMIT 10")
            .fetch_all(&mut self.conn)
            .await?;
        let mut user_table = Table::new(&["id", "has_labels"]);
        for u in users {
            user_table.push_row(vec![u.id, (u.has_labels as u8).to_string()]);
        }

        let activities: Vec<ActivityRow> = sqlx::query_as(
            "SELECT id, user_id, transportation_mode, start_date_time, end_date_time
             FROM activity LIMIT 10",
        )
        .fetch_all(&mut self.conn)
        .await?;
        let mut activity_table = Table::new(&[
            "id",
            "user_id",
            "transportation_mode",
            "start_date_time",
            "end_date_time",
        ]);
        for a in activities {
            activity_table.push_row(vec![
                a.id.to_string(),
                a.user_id,
                display_mode(a.transportation_mode),
                a.start_date_time.to_string(),
                a.end_date_time.to_string(),
            ]);
        }

        let points: Vec<TrackPointRow> = sqlx::query_as(
            "SELECT id, activity_id, lat, lon, altitude, date_days, date_time
             FROM track_point LIMIT 10",
        )
        .fetch_all(&mut self.conn)
        .await?;
        let mut point_table = Table::new(&[
            "id",
            "activity_id",
            "lat",
            "lon",
            "altitude",
            "date_days",
            "date_time",
        ]);
        for p in points {
            point_table.push_row(vec![
                p.id.to_string(),
                p.activity_id.to_string(),
                p.lat.to_string(),
                p.lon.to_string(),
                p.altitude.to_string(),
                p.date_days.to_string(),
                p.date_time.to_string(),
            ]);
        }

        Ok(vec![
            TaskReport::new("User table:", user_table),
            TaskReport::new("Activity table:", activity_table),
            TaskReport::new("Track point table:", point_table),
        ])
    }

    pub async fn run(&mut self, task: SqlTask) -> Result<TaskReport> {
        match task {
            SqlTask::Counts => self.task_counts().await,
            SqlTask::TrackPointsPerUser => self.task_track_points_per_user().await,
            SqlTask::TopActivityUsers => self.task_top_activity_users().await,
            SqlTask::BusUsers => self.task_bus_users().await,
            SqlTask::TopModeVariety => self.task_top_mode_variety().await,
            SqlTask::DuplicateActivities => self.task_duplicate_activities().await,
            SqlTask::NextDayUserCount => self.task_next_day_user_count().await,
            SqlTask::NextDayActivities => self.task_next_day_activities().await,
            SqlTask::CloseUsers => self.task_close_users().await,
            SqlTask::AltitudeGain => self.task_altitude_gain().await,
            SqlTask::LongestDailyDistance => self.task_longest_daily_distance().await,
            SqlTask::InvalidActivities => self.task_invalid_activities().await,
            SqlTask::FavouriteMode => self.task_favourite_mode().await,
        }
    }

    async fn task_counts(&mut self) -> Result<TaskReport> {
        let (users, activities, track_points) = self.counts().await?;

        Ok(TaskReport::single(
            "Task 1: Number of users, activities and trackpoints in the database:",
            &[
                ("user_count", users),
                ("activity_count", activities),
                ("trackpoint_count", track_points),
            ],
        ))
    }

    async fn task_track_points_per_user(&mut self) -> Result<TaskReport> {
        let (average, minimum, maximum): (Option<f64>, Option<i64>, Option<i64>) =
            sqlx::query_as(
                "SELECT CAST(AVG(user_counts.trackpoint_count) AS DOUBLE),
                        MIN(user_counts.trackpoint_count),
                        MAX(user_counts.trackpoint_count)
                 FROM (
                     SELECT COUNT(*) AS trackpoint_count
                     FROM activity
                     INNER JOIN track_point ON activity.id = track_point.activity_id
                     GROUP BY user_id
                 ) AS user_counts",
            )
            .fetch_one(&mut self.conn)
            .await?;

        Ok(TaskReport::single(
            "Task 2: Average, minimum and maximum number of trackpoints logged by the users:",
            &[
                ("average_count", format!("{:.4}", average.unwrap_or(0.0))),
                ("minimum_count", minimum.unwrap_or(0).to_string()),
                ("maximum_count", maximum.unwrap_or(0).to_string()),
            ],
        ))
    }

    async fn task_top_activity_users(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT user_id, COUNT(*) AS activity_count
             FROM activity
             GROUP BY user_id
             ORDER BY activity_count DESC, user_id
             LIMIT 15",
        )
        .fetch_all(&mut self.conn)
        .await?;

        Ok(pairs_report(
            "Task 3: Top 15 users with the most activities logged:",
            &["user_id", "activity_count"],
            rows,
        ))
    }

    async fn task_bus_users(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT user_id FROM activity
             WHERE transportation_mode = 'bus'
             ORDER BY user_id",
        )
        .fetch_all(&mut self.conn)
        .await?;

        let mut table = Table::new(&["user_id"]);
        rows.into_iter().for_each(|(user,)| table.push_row(vec![user]));

        Ok(TaskReport::new(
            "Task 4: Users that have logged taking the bus:",
            table,
        ))
    }

    async fn task_top_mode_variety(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT user_id, COUNT(DISTINCT transportation_mode) AS transportation_count
             FROM activity
             GROUP BY user_id
             ORDER BY transportation_count DESC, user_id
             LIMIT 10",
        )
        .fetch_all(&mut self.conn)
        .await?;

        Ok(pairs_report(
            "Task 5: Top 10 users with most types of different transportation modes:",
            &["user_id", "transportation_count"],
            rows,
        ))
    }

    async fn task_duplicate_activities(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String, Option<String>, chrono::NaiveDateTime, chrono::NaiveDateTime, i64)> =
            sqlx::query_as(
                "SELECT user_id, transportation_mode, start_date_time, end_date_time, COUNT(*)
                 FROM activity
                 GROUP BY user_id, transportation_mode, start_date_time, end_date_time
                 HAVING COUNT(*) > 1",
            )
            .fetch_all(&mut self.conn)
            .await?;

        let mut table = Table::new(&[
            "user_id",
            "transportation_mode",
            "start_date_time",
            "end_date_time",
            "times",
        ]);
        for (user, mode, start, end, times) in rows {
            table.push_row(vec![
                user,
                display_mode(mode),
                start.to_string(),
                end.to_string(),
                times.to_string(),
            ]);
        }

        Ok(TaskReport::new("Task 6: Activities that are logged twice:", table))
    }

    async fn task_next_day_user_count(&mut self) -> Result<TaskReport> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id)
             FROM activity
             WHERE DATEDIFF(end_date_time, start_date_time) = 1",
        )
        .fetch_one(&mut self.conn)
        .await?;

        Ok(TaskReport::single(
            "Task 7a: Number of users with activities that end the next day:",
            &[("user_count", count)],
        ))
    }

    async fn task_next_day_activities(&mut self) -> Result<TaskReport> {
        let rows: Vec<(i32, String, Option<String>, i64)> = sqlx::query_as(
            "SELECT id, user_id, transportation_mode,
                    TIMESTAMPDIFF(SECOND, start_date_time, end_date_time) AS duration
             FROM activity
             WHERE DATEDIFF(end_date_time, start_date_time) = 1
             ORDER BY id",
        )
        .fetch_all(&mut self.conn)
        .await?;

        let mut table = Table::new(&["id", "user_id", "transportation_mode", "duration"]);
        for (id, user, mode, seconds) in rows {
            table.push_row(vec![
                id.to_string(),
                user,
                display_mode(mode),
                DateTimeUtils::format_duration_secs(seconds),
            ]);
        }

        Ok(TaskReport::new("Task 7b: Activities that end the next day:", table))
    }

    async fn task_close_users(&mut self) -> Result<TaskReport> {
        let detector = ProximityDetector::new(ProximityRule::default());
        let close_users = detector
            .find_close_users(&mut SqlProximitySource::new(&mut self.conn))
            .await?;

        Ok(TaskReport::single(
            "Task 8: Number of users that have been close to each other:",
            &[("user_count", close_users.len())],
        ))
    }

    async fn task_altitude_gain(&mut self) -> Result<TaskReport> {
        // -777 is filtered before LAG so it never forms either side of a pair
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "WITH tp_cleaned AS (
                 SELECT activity_id, altitude,
                        LAG(altitude) OVER (PARTITION BY activity_id ORDER BY id) AS prev_altitude
                 FROM track_point
                 WHERE altitude != -777
             )
             SELECT activity.user_id,
                    CAST(SUM(CASE
                        WHEN tp.altitude > tp.prev_altitude
                        THEN (tp.altitude - tp.prev_altitude) * 0.3048
                        ELSE 0
                    END) AS DOUBLE) AS total_gained_altitude
             FROM activity
             INNER JOIN tp_cleaned tp ON tp.activity_id = activity.id
             GROUP BY activity.user_id
             ORDER BY total_gained_altitude DESC, activity.user_id
             LIMIT 15",
        )
        .fetch_all(&mut self.conn)
        .await?;

        let mut table = Table::new(&["user_id", "total_gained_altitude"]);
        for (user, gained) in rows {
            table.push_row(vec![user, format!("{:.2}", gained)]);
        }

        Ok(TaskReport::new(
            "Task 9: Top 15 users with the highest total altitude gained:",
            table,
        ))
    }

    async fn task_longest_daily_distance(&mut self) -> Result<TaskReport> {
        let users: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM user WHERE has_labels = 1 ORDER BY id")
                .fetch_all(&mut self.conn)
                .await?;

        let modes: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT transportation_mode FROM activity
             WHERE transportation_mode IS NOT NULL",
        )
        .fetch_all(&mut self.conn)
        .await?;

        let mut records = ModeRecords::new(modes.into_iter().map(|(m,)| m));

        for (user_id,) in users {
            logln!("Calculating distances for user {}", user_id);

            let rows: Vec<ModePointRow> = sqlx::query_as(
                "SELECT activity.id AS activity_id, lat, lon, date_time, transportation_mode
                 FROM activity
                 INNER JOIN track_point ON activity.id = track_point.activity_id
                 WHERE transportation_mode IS NOT NULL AND user_id = ?
                 ORDER BY track_point.id",
            )
            .bind(&user_id)
            .fetch_all(&mut self.conn)
            .await?;

            let points: Vec<ModePoint<i32>> = rows
                .into_iter()
                .map(|r| ModePoint {
                    activity_id: r.activity_id,
                    coord: GeoUtils::latlon(r.lat, r.lon),
                    date_time: r.date_time,
                    transportation_mode: r.transportation_mode,
                })
                .collect();

            records.add_user(&user_id, &points);
        }

        let mut table = Table::new(&["transportation_mode", "user_id", "distance_km"]);
        for (mode, (user, distance)) in records.records() {
            table.push_row(vec![
                mode.clone(),
                user.clone().unwrap_or_else(|| "None".to_string()),
                format!("{:.2}", distance),
            ]);
        }

        Ok(TaskReport::new(
            "Task 10: Users with the longest distance traveled in one day per transportation mode:",
            table,
        ))
    }

    async fn task_invalid_activities(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "WITH gaps AS (
                 SELECT activity_id,
                        ABS(TIMESTAMPDIFF(SECOND,
                            LAG(date_time) OVER (PARTITION BY activity_id ORDER BY id),
                            date_time)) AS gap_seconds
                 FROM track_point
             )
             SELECT activity.user_id, COUNT(*) AS invalid_activity_count
             FROM (
                 SELECT DISTINCT activity_id FROM gaps WHERE gap_seconds >= 300
             ) AS invalid_activities
             INNER JOIN activity ON invalid_activities.activity_id = activity.id
             GROUP BY activity.user_id
             ORDER BY activity.user_id",
        )
        .fetch_all(&mut self.conn)
        .await?;

        Ok(pairs_report(
            "Task 11: Users with invalid activities:",
            &["user_id", "invalid_activity_count"],
            rows,
        ))
    }

    async fn task_favourite_mode(&mut self) -> Result<TaskReport> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT user_id, transportation_mode
             FROM (
                 SELECT user_id, transportation_mode,
                        ROW_NUMBER() OVER (
                            PARTITION BY user_id
                            ORDER BY transportation_count DESC, transportation_mode
                        ) AS ranking
                 FROM (
                     SELECT user_id, transportation_mode, COUNT(*) AS transportation_count
                     FROM activity
                     WHERE transportation_mode IS NOT NULL
                     GROUP BY user_id, transportation_mode
                 ) AS transportation_counts
             ) AS transportation_ranking
             WHERE ranking = 1
             ORDER BY user_id",
        )
        .fetch_all(&mut self.conn)
        .await?;

        Ok(pairs_report(
            "Task 12: Most used transportation mode per user:",
            &["user_id", "transportation_mode"],
            rows,
        ))
    }
}

fn display_mode(mode: Option<String>) -> String {
    mode.unwrap_or_else(|| "None".to_string())
}

fn pairs_report<A: ToString, B: ToString>(
    title: &str,
    headers: &[&str],
    rows: Vec<(A, B)>,
) -> TaskReport {
    let mut table = Table::new(headers);
    for (a, b) in rows {
        table.push_row(vec![a.to_string(), b.to_string()]);
    }

    TaskReport::new(title, table)
}

/// Proximity queries over the relational schema. Bounding boxes are
/// aggregated and joined by the database.
pub struct SqlProximitySource<'a> {
    conn: &'a mut MySqlConnection,
}

impl<'a> SqlProximitySource<'a> {
    pub fn new(conn: &'a mut MySqlConnection) -> Self {
        Self { conn }
    }
}

const ACTIVITY_BOUNDS: &str = "
    SELECT activity.id, MAX(lat) AS max_lat, MAX(lon) AS max_lon,
           MIN(lat) AS min_lat, MIN(lon) AS min_lon,
           activity.start_date_time, activity.end_date_time
    FROM activity
    INNER JOIN track_point ON activity.id = track_point.activity_id
    WHERE user_id = ?
    GROUP BY activity.id, activity.start_date_time, activity.end_date_time";

#[async_trait]
impl ProximitySource for SqlProximitySource<'_> {
    type ActivityId = i32;

    async fn user_ids(&mut self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM user ORDER BY id")
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn candidate_activity_pairs(
        &mut self,
        first_user: &str,
        second_user: &str,
    ) -> Result<Vec<(i32, i32)>> {
        let query = format!(
            "SELECT u1.id, u2.id
             FROM ({bounds}) AS u1
             INNER JOIN ({bounds}) AS u2
             ON u1.max_lat >= u2.min_lat
             AND u1.max_lon >= u2.min_lon
             AND u1.min_lat <= u2.max_lat
             AND u1.min_lon <= u2.max_lon
             AND u1.end_date_time >= u2.start_date_time
             AND u1.start_date_time <= u2.end_date_time",
            bounds = ACTIVITY_BOUNDS
        );

        let pairs = sqlx::query_as(&query)
            .bind(first_user)
            .bind(second_user)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(pairs)
    }

    async fn activity_points(&mut self, activity_id: &i32) -> Result<Vec<TimedPoint>> {
        let rows: Vec<(f64, f64, chrono::NaiveDateTime)> = sqlx::query_as(
            "SELECT lat, lon, date_time FROM track_point
             WHERE activity_id = ?
             ORDER BY id",
        )
        .bind(*activity_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(lat, lon, date_time)| TimedPoint {
                coord: GeoUtils::latlon(lat, lon),
                date_time,
            })
            .collect())
    }
}
