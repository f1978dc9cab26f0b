//! Document backend: `user`, `activity` and `track_point` collections in MongoDB.

use std::{collections::HashMap, str::FromStr};

use async_trait::async_trait;
use geo_types::Coord;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    Client, Collection, IndexModel,
};

use crate::{
    config::TaskConfig,
    data_types::{
        document::{
            from_bson_datetime, ActivityBoundsDoc, ActivityDoc, ActivityJoin, AltitudeOnly,
            PositionOnly, TimeOnly, TrackPointDoc, UserDoc,
        },
        geolife::{IngestionSummary, UserRecord},
        report::TaskReport,
    },
    error::{GeolifeError, Result},
    ingestion::DatasetReader,
    logln, logvbln,
    processors::{
        altitude::AltitudeLeaderboard,
        distance::{any_within_radius, distance_in_year_km},
        proximity::{
            overlapping_pairs, ActivityBounds, ProximityDetector, ProximityRule, ProximitySource,
            TimedPoint,
        },
        validity::InvalidActivityCounter,
        yearly::{busiest_year, recorded_hours_per_year},
    },
    util::{
        geo::{BoundingBox, GeoUtils},
        table::Table,
    },
};

use super::mongodb::MongoDatabase;

/// Tasks runnable against the document schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MongoTask {
    Counts,
    AverageActivities,
    TopActivityUsers,
    TaxiUsers,
    ModeCounts,
    BusiestYearByActivities,
    BusiestYearByHours,
    BusiestYearByHoursSplit,
    DistanceWalked,
    AltitudeGain,
    InvalidActivities,
    NearLandmark,
    FavouriteMode,
    CloseUsers,
}

impl MongoTask {
    pub const ALL: [MongoTask; 14] = [
        MongoTask::Counts,
        MongoTask::AverageActivities,
        MongoTask::TopActivityUsers,
        MongoTask::TaxiUsers,
        MongoTask::ModeCounts,
        MongoTask::BusiestYearByActivities,
        MongoTask::BusiestYearByHours,
        MongoTask::BusiestYearByHoursSplit,
        MongoTask::DistanceWalked,
        MongoTask::AltitudeGain,
        MongoTask::InvalidActivities,
        MongoTask::NearLandmark,
        MongoTask::FavouriteMode,
        MongoTask::CloseUsers,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            MongoTask::Counts => "1",
            MongoTask::AverageActivities => "2",
            MongoTask::TopActivityUsers => "3",
            MongoTask::TaxiUsers => "4",
            MongoTask::ModeCounts => "5",
            MongoTask::BusiestYearByActivities => "6a",
            MongoTask::BusiestYearByHours => "6b",
            MongoTask::BusiestYearByHoursSplit => "6b2",
            MongoTask::DistanceWalked => "7",
            MongoTask::AltitudeGain => "8",
            MongoTask::InvalidActivities => "9",
            MongoTask::NearLandmark => "10",
            MongoTask::FavouriteMode => "11",
            MongoTask::CloseUsers => "12",
        }
    }
}

impl FromStr for MongoTask {
    type Err = GeolifeError;

    fn from_str(s: &str) -> Result<Self> {
        MongoTask::ALL
            .into_iter()
            .find(|t| t.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GeolifeError::UnknownTask(s.to_string()))
    }
}

/// Inputs of the parameterised document tasks.
#[derive(Debug, Clone)]
pub struct TaskParameters {
    pub walk_user: String,
    pub walk_year: i32,
    pub walk_mode: String,
    pub landmark: Coord,
    pub landmark_radius_km: f64,
}

impl From<&TaskConfig> for TaskParameters {
    fn from(config: &TaskConfig) -> Self {
        Self {
            walk_user: config.walk_user.clone(),
            walk_year: config.walk_year,
            walk_mode: config.walk_mode.clone(),
            landmark: GeoUtils::latlon(config.landmark_lat, config.landmark_lon),
            landmark_radius_km: config.landmark_radius_km,
        }
    }
}

impl Default for TaskParameters {
    fn default() -> Self {
        Self::from(&TaskConfig::default())
    }
}

struct GeolifeCollections {
    users: Collection<UserDoc>,
    activities: Collection<ActivityDoc>,
    track_points: Collection<TrackPointDoc>,
}

pub struct GeolifeMongo {
    client: Client,
    db_conn: MongoDatabase,
    colls: GeolifeCollections,
    params: TaskParameters,
}

impl GeolifeMongo {
    const CC: &'static str = "MongoDB";

    pub async fn connect(uri: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db_conn = MongoDatabase::new(&client.database(database));

        let colls = GeolifeCollections {
            users: db_conn.typed_collection("user"),
            activities: db_conn.typed_collection("activity"),
            track_points: db_conn.typed_collection("track_point"),
        };

        Ok(Self {
            client,
            db_conn,
            colls,
            params: TaskParameters::default(),
        })
    }

    pub fn with_parameters(mut self, params: TaskParameters) -> Self {
        self.params = params;
        self
    }

    pub async fn close(self) {
        self.client.shutdown().await;
    }

    /// Drop all three collections and recreate the `activity_id` index.
    pub async fn reset_collections(&self) -> Result<()> {
        self.colls.users.drop(None).await?;
        self.colls.activities.drop(None).await?;
        self.colls.track_points.drop(None).await?;

        // Every $lookup on track points joins through this field
        self.colls
            .track_points
            .create_index(IndexModel::builder().keys(doc! {"activity_id": 1}).build(), None)
            .await?;

        logln!("Collections recreated");
        Ok(())
    }

    pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        self.colls
            .users
            .insert_one(
                UserDoc {
                    _id: user.id.clone(),
                    has_labels: user.has_labels as i32,
                },
                None,
            )
            .await?;

        for activity in &user.activities {
            let inserted = self
                .colls
                .activities
                .insert_one(ActivityDoc::from(activity), None)
                .await?;

            let Some(activity_id) = inserted.inserted_id.as_object_id() else {
                return Err(GeolifeError::InsertedId(inserted.inserted_id.to_string()));
            };

            let points: Vec<TrackPointDoc> = activity
                .track_points
                .iter()
                .map(|p| TrackPointDoc::new(activity_id, p))
                .collect();

            if !points.is_empty() {
                self.colls.track_points.insert_many(points, None).await?;
            }
        }

        Ok(())
    }

    /// Reset the collections and load the whole dataset.
    pub async fn ingest(&self, reader: &DatasetReader) -> Result<IngestionSummary> {
        self.reset_collections().await?;

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
    pub async fn counts(&self) -> Result<(u64, u64, u64)> {
        Ok((
            self.colls.users.count_documents(doc! {}, None).await?,
            self.colls.activities.count_documents(doc! {}, None).await?,
            self.colls.track_points.count_documents(doc! {}, None).await?,
        ))
    }

    /// First ten documents of every collection.
    pub async fn show(&self) -> Result<Vec<TaskReport>> {
        let mut reports = Vec::new();

        for name in self.db_conn.collection_names().await? {
            let collection: Collection<Document> = self.db_conn.typed_collection(&name);
            let docs = self
                .db_conn
                .find(&collection, doc! {}, None, Some(10))
                .await?;

            let mut table = Table::new(&["document"]);
            for d in docs {
                table.push_row(vec![
                    serde_json::to_string(&d).unwrap_or_else(|_| format!("{}", d))
                ]);
            }

            reports.push(TaskReport::new(format!("{} Collection:", name), table));
        }

        Ok(reports)
    }

    pub async fn run(&self, task: MongoTask) -> Result<TaskReport> {
        match task {
            MongoTask::Counts => self.task_counts().await,
            MongoTask::AverageActivities => self.task_average_activities().await,
            MongoTask::TopActivityUsers => self.task_top_activity_users().await,
            MongoTask::TaxiUsers => self.task_taxi_users().await,
            MongoTask::ModeCounts => self.task_mode_counts().await,
            MongoTask::BusiestYearByActivities => self.task_busiest_year_by_activities().await,
            MongoTask::BusiestYearByHours => self.task_busiest_year_by_hours().await,
            MongoTask::BusiestYearByHoursSplit => self.task_busiest_year_by_hours_split().await,
            MongoTask::DistanceWalked => self.task_distance_walked().await,
            MongoTask::AltitudeGain => self.task_altitude_gain().await,
            MongoTask::InvalidActivities => self.task_invalid_activities().await,
            MongoTask::NearLandmark => self.task_near_landmark().await,
            MongoTask::FavouriteMode => self.task_favourite_mode().await,
            MongoTask::CloseUsers => self.task_close_users().await,
        }
    }

    async fn task_counts(&self) -> Result<TaskReport> {
        let (users, activities, track_points) = self.counts().await?;

        Ok(TaskReport::single(
            "Task 1: Number of users, activities and trackpoints:",
            &[
                ("users", users),
                ("activities", activities),
                ("trackpoints", track_points),
            ],
        ))
    }

    async fn task_average_activities(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    doc! {"$group": {"_id": "$user_id", "activity_count": {"$sum": 1}}},
                    doc! {"$group": {"_id": Bson::Null, "average_activities": {"$avg": "$activity_count"}}},
                ],
            )
            .await?;

        let average = match docs.first() {
            Some(d) => d.get_f64("average_activities")?,
            None => 0.0,
        };

        Ok(TaskReport::single(
            "Task 2: Average activities per user",
            &[("average_activities", format!("{:.2}", average))],
        ))
    }

    async fn task_top_activity_users(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    doc! {"$group": {"_id": "$user_id", "activity_count": {"$sum": 1}}},
                    doc! {"$sort": {"activity_count": -1, "_id": 1}},
                    doc! {"$limit": 20},
                ],
            )
            .await?;

        Ok(docs_report(
            "Task 3: Top 20 users with highest number of activities",
            &["_id", "activity_count"],
            &docs,
        ))
    }

    async fn task_taxi_users(&self) -> Result<TaskReport> {
        let mut users: Vec<String> = self
            .colls
            .activities
            .distinct("user_id", doc! {"transportation_mode": "taxi"}, None)
            .await?
            .iter()
            .map(bson_display)
            .collect();
        users.sort();

        let mut table = Table::new(&["user_id"]);
        users.into_iter().for_each(|u| table.push_row(vec![u]));

        Ok(TaskReport::new("Task 4: Users that have taken a taxi", table))
    }

    async fn task_mode_counts(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    doc! {"$match": {"transportation_mode": {"$ne": Bson::Null}}},
                    doc! {"$group": {"_id": "$transportation_mode", "activity_count": {"$sum": 1}}},
                    doc! {"$sort": {"_id": 1}},
                ],
            )
            .await?;

        Ok(docs_report(
            "Task 5: Activity count of each transportation mode",
            &["_id", "activity_count"],
            &docs,
        ))
    }

    async fn task_busiest_year_by_activities(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    // An activity ending in a later year counts for both years
                    doc! {"$project": {"years": {"$cond": {
                        "if": {"$ne": [{"$year": "$start_date_time"}, {"$year": "$end_date_time"}]},
                        "then": [{"$year": "$start_date_time"}, {"$year": "$end_date_time"}],
                        "else": [{"$year": "$start_date_time"}],
                    }}}},
                    doc! {"$unwind": "$years"},
                    doc! {"$group": {"_id": "$years", "activity_count": {"$sum": 1}}},
                    doc! {"$sort": {"activity_count": -1, "_id": 1}},
                    doc! {"$limit": 1},
                ],
            )
            .await?;

        Ok(docs_report(
            "Task 6a: The year with most activities",
            &["_id", "activity_count"],
            &docs,
        ))
    }

    async fn task_busiest_year_by_hours(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    doc! {"$project": {
                        "start_year": {"$year": "$start_date_time"},
                        "duration": {"$divide": [
                            {"$dateDiff": {
                                "startDate": "$start_date_time",
                                "endDate": "$end_date_time",
                                "unit": "minute",
                            }},
                            60.0,
                        ]},
                    }},
                    doc! {"$group": {"_id": "$start_year", "total_hours": {"$sum": "$duration"}}},
                    doc! {"$sort": {"total_hours": -1, "_id": 1}},
                    doc! {"$limit": 1},
                ],
            )
            .await?;

        Ok(docs_report(
            "Task 6b: Year with most hours",
            &["_id", "total_hours"],
            &docs,
        ))
    }

    async fn task_busiest_year_by_hours_split(&self) -> Result<TaskReport> {
        let activities = self
            .db_conn
            .find(&self.colls.activities, doc! {}, None, None)
            .await?;

        let spans: Vec<_> = activities
            .iter()
            .filter_map(|a| {
                Some((
                    from_bson_datetime(a.start_date_time)?,
                    from_bson_datetime(a.end_date_time)?,
                ))
            })
            .collect();

        let mut table = Table::new(&["year", "total_hours"]);
        if let Some((year, hours)) = busiest_year(&recorded_hours_per_year(&spans)) {
            table.push_row(vec![year.to_string(), format!("{:.2}", hours)]);
        }

        Ok(TaskReport::new(
            "Task 6b2: Year with most hours (activities split at New Year)",
            table,
        ))
    }

    async fn task_distance_walked(&self) -> Result<TaskReport> {
        let params = &self.params;
        let activities: Vec<ActivityJoin<PositionOnly>> = self
            .db_conn
            .query(
                &self.colls.activities,
                vec![
                    doc! {"$addFields": {"start_year": {"$year": "$start_date_time"}}},
                    doc! {"$match": {
                        "user_id": params.walk_user.as_str(),
                        "transportation_mode": params.walk_mode.as_str(),
                        "start_year": params.walk_year,
                    }},
                    lookup_track_points(doc! {"_id": 0, "lat": 1, "lon": 1, "date_time": 1}),
                ],
            )
            .await?;

        let distance_km: f64 = activities
            .iter()
            .map(|activity| {
                let points: Vec<_> = activity
                    .track_points
                    .iter()
                    .filter_map(|p| {
                        Some((GeoUtils::latlon(p.lat, p.lon), from_bson_datetime(p.date_time)?))
                    })
                    .collect();
                distance_in_year_km(&points, params.walk_year)
            })
            .sum();

        Ok(TaskReport::single(
            format!(
                "Task 7: Total distance ({}) by user {} in {}",
                params.walk_mode, params.walk_user, params.walk_year
            ),
            &[("distance_km", format!("{:.2}", distance_km))],
        ))
    }

    async fn task_altitude_gain(&self) -> Result<TaskReport> {
        let activities: Vec<ActivityJoin<AltitudeOnly>> = self
            .db_conn
            .query(
                &self.colls.activities,
                vec![
                    doc! {"$project": {"user_id": 1}},
                    lookup_track_points(doc! {"_id": 0, "altitude": 1}),
                ],
            )
            .await?;

        let mut leaderboard = AltitudeLeaderboard::default();
        for activity in &activities {
            leaderboard.add_activity(
                &activity.user_id,
                activity.track_points.iter().map(|p| p.altitude),
            );
        }

        let mut table = Table::new(&["user_id", "gained_altitude_m"]);
        for (user, gained) in leaderboard.top(20) {
            table.push_row(vec![user, format!("{:.2}", gained)]);
        }

        Ok(TaskReport::new(
            "Task 8: Top 20 users with highest gained altitude",
            table,
        ))
    }

    async fn task_invalid_activities(&self) -> Result<TaskReport> {
        let activities: Vec<ActivityJoin<TimeOnly>> = self
            .db_conn
            .query(
                &self.colls.activities,
                vec![
                    doc! {"$project": {"user_id": 1}},
                    lookup_track_points(doc! {"_id": 0, "date_time": 1}),
                ],
            )
            .await?;

        let mut counter = InvalidActivityCounter::default();
        for activity in &activities {
            let times: Vec<_> = activity
                .track_points
                .iter()
                .filter_map(|p| from_bson_datetime(p.date_time))
                .collect();
            counter.add_activity(&activity.user_id, &times);
        }

        let mut table = Table::new(&["user_id", "invalid_activities"]);
        for (user, count) in counter.counts() {
            table.push_row(vec![user.clone(), count.to_string()]);
        }

        Ok(TaskReport::new("Task 9: Users with illegal activities", table))
    }

    async fn task_near_landmark(&self) -> Result<TaskReport> {
        let users = self
            .db_conn
            .find(&self.colls.users, doc! {}, Some(doc! {"_id": 1}), None)
            .await?;

        let mut table = Table::new(&["user_id"]);
        for user in users {
            if self.user_near_landmark(&user._id).await? {
                logln!("User {} has been near the landmark", user._id);
                table.push_row(vec![user._id]);
            }
        }

        Ok(TaskReport::new(
            format!(
                "Task 10: Users that have been within {} km of ({}, {})",
                self.params.landmark_radius_km, self.params.landmark.y, self.params.landmark.x
            ),
            table,
        ))
    }

    async fn user_near_landmark(&self, user_id: &str) -> Result<bool> {
        let activities: Vec<ActivityJoin<PositionOnly>> = self
            .db_conn
            .query(
                &self.colls.activities,
                vec![
                    doc! {"$match": {"user_id": user_id}},
                    lookup_track_points(doc! {"_id": 0, "lat": 1, "lon": 1, "date_time": 1}),
                ],
            )
            .await?;

        Ok(activities.iter().any(|activity| {
            let coords: Vec<Coord> = activity
                .track_points
                .iter()
                .map(|p| GeoUtils::latlon(p.lat, p.lon))
                .collect();
            any_within_radius(&coords, self.params.landmark, self.params.landmark_radius_km)
        }))
    }

    async fn task_favourite_mode(&self) -> Result<TaskReport> {
        let docs = self
            .db_conn
            .query_docs(
                &self.colls.activities,
                vec![
                    doc! {"$match": {"transportation_mode": {"$ne": Bson::Null}}},
                    doc! {"$group": {
                        "_id": {"user_id": "$user_id", "transportation_mode": "$transportation_mode"},
                        "activity_count": {"$sum": 1},
                    }},
                    doc! {"$sort": {
                        "_id.user_id": 1,
                        "activity_count": -1,
                        "_id.transportation_mode": 1,
                    }},
                    doc! {"$group": {
                        "_id": "$_id.user_id",
                        "most_used_transportation_mode": {"$first": "$_id.transportation_mode"},
                    }},
                    doc! {"$sort": {"_id": 1}},
                ],
            )
            .await?;

        Ok(docs_report(
            "Task 11: Most used transportation mode for each user",
            &["_id", "most_used_transportation_mode"],
            &docs,
        ))
    }

    async fn task_close_users(&self) -> Result<TaskReport> {
        let detector = ProximityDetector::new(ProximityRule::default());
        let close_users = detector
            .find_close_users(&mut MongoProximitySource::new(self))
            .await?;

        Ok(TaskReport::single(
            "Task 12: Number of users that have been close to each other:",
            &[("user_count", close_users.len())],
        ))
    }
}

/// `$lookup` of an activity's track points in insertion order, projected.
fn lookup_track_points(projection: Document) -> Document {
    doc! {"$lookup": {
        "from": "track_point",
        "localField": "_id",
        "foreignField": "activity_id",
        "pipeline": [{"$sort": {"_id": 1}}, {"$project": projection}],
        "as": "track_points",
    }}
}

pub fn bson_display(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(d) => format!("{:.2}", d),
        Bson::Null => "None".to_string(),
        other => other.to_string(),
    }
}

fn docs_report(title: &str, fields: &[&str], docs: &[Document]) -> TaskReport {
    let mut table = Table::new(fields);
    for d in docs {
        table.push_row(
            fields
                .iter()
                .map(|f| d.get(*f).map(bson_display).unwrap_or_default())
                .collect(),
        );
    }

    TaskReport::new(title, table)
}

/// Proximity queries over the document schema. Activity extents are
/// aggregated per user once and joined client side.
pub struct MongoProximitySource<'a> {
    mongo: &'a GeolifeMongo,
    bounds: HashMap<String, Vec<ActivityBounds<ObjectId>>>,
}

impl<'a> MongoProximitySource<'a> {
    const CC: &'static str = "MongoProximity";

    pub fn new(mongo: &'a GeolifeMongo) -> Self {
        Self {
            mongo,
            bounds: HashMap::new(),
        }
    }

    async fn user_bounds(&mut self, user_id: &str) -> Result<Vec<ActivityBounds<ObjectId>>> {
        if let Some(cached) = self.bounds.get(user_id) {
            return Ok(cached.clone());
        }

        let docs: Vec<ActivityBoundsDoc> = self
            .mongo
            .db_conn
            .query(
                &self.mongo.colls.activities,
                vec![
                    doc! {"$match": {"user_id": user_id}},
                    lookup_track_points(doc! {"_id": 0, "lat": 1, "lon": 1}),
                    doc! {"$project": {
                        "start_date_time": 1,
                        "end_date_time": 1,
                        "min_lat": {"$min": "$track_points.lat"},
                        "max_lat": {"$max": "$track_points.lat"},
                        "min_lon": {"$min": "$track_points.lon"},
                        "max_lon": {"$max": "$track_points.lon"},
                    }},
                    doc! {"$match": {"min_lat": {"$ne": Bson::Null}}},
                ],
            )
            .await?;

        let bounds: Vec<ActivityBounds<ObjectId>> = docs
            .into_iter()
            .filter_map(|d| {
                Some(ActivityBounds {
                    activity_id: d._id,
                    bbox: BoundingBox::from_bounds(d.min_lat, d.min_lon, d.max_lat, d.max_lon),
                    start: from_bson_datetime(d.start_date_time)?,
                    end: from_bson_datetime(d.end_date_time)?,
                })
            })
            .collect();

        logvbln!("User {}: {} activity extents", user_id, bounds.len());
        self.bounds.insert(user_id.to_string(), bounds.clone());

        Ok(bounds)
    }
}

#[async_trait]
impl ProximitySource for MongoProximitySource<'_> {
    type ActivityId = ObjectId;

    async fn user_ids(&mut self) -> Result<Vec<String>> {
        let users = self
            .mongo
            .db_conn
            .find(&self.mongo.colls.users, doc! {}, Some(doc! {"_id": 1}), None)
            .await?;

        Ok(users.into_iter().map(|u| u._id).collect())
    }

    async fn candidate_activity_pairs(
        &mut self,
        first_user: &str,
        second_user: &str,
    ) -> Result<Vec<(ObjectId, ObjectId)>> {
        let first = self.user_bounds(first_user).await?;
        let second = self.user_bounds(second_user).await?;

        Ok(overlapping_pairs(&first, &second))
    }

    async fn activity_points(&mut self, activity_id: &ObjectId) -> Result<Vec<TimedPoint>> {
        let points = self
            .mongo
            .db_conn
            .find(
                &self.mongo.colls.track_points,
                doc! {"activity_id": *activity_id},
                Some(doc! {"_id": 1}),
                None,
            )
            .await?;

        Ok(points
            .iter()
            .filter_map(|p| {
                Some(TimedPoint {
                    coord: GeoUtils::latlon(p.lat, p.lon),
                    date_time: from_bson_datetime(p.date_time)?,
                })
            })
            .collect())
    }
}
