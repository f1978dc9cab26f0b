//! MongoDB round trips.
//!
//! Everything runs in one test against a disposable database, which it will
//! clear: it drops and recreates its collections.
//! Run with: GEOLIFE_TEST_MONGODB_URI=mongodb://localhost:27017 cargo test

use geolife_db::{
    config::TaskConfig,
    database::mongo_db::{GeolifeMongo, MongoTask, TaskParameters},
    ingestion::DatasetReader,
};

mod common;
use common::FixtureDataset;

fn fixture() -> FixtureDataset {
    let fixture = FixtureDataset::new();
    fixture
        .labeled_ids(&["010"])
        .labels("010", &[("2008/03/28 14:52:54", "2008/03/28 15:59:59", "taxi")])
        .trajectory(
            "010",
            "20080328145254",
            &[
                (39.9000, 116.4000, 100, "2008-03-28 14:52:54"),
                (39.9100, 116.4100, 150, "2008-03-28 15:59:59"),
            ],
        )
        .trajectory(
            "011",
            "20080328150000",
            &[
                (39.9001, 116.4000, 100, "2008-03-28 14:53:00"),
                (39.9500, 116.4500, 120, "2008-03-28 15:30:00"),
            ],
        )
        .trajectory(
            "011",
            "20080401100000",
            &[
                (39.9500, 116.4500, 120, "2008-04-01 10:00:00"),
                (39.9510, 116.4510, 130, "2008-04-01 10:01:00"),
            ],
        );
    fixture
}

#[tokio::test]
async fn test_ingest_is_idempotent_and_tasks_run() {
    let url = require_db!("GEOLIFE_TEST_MONGODB_URI");
    let fixture = fixture();
    let reader = DatasetReader::new(fixture.root(), 2506);

    // Landmark on 011's April activity, out of 010's reach
    let tasks = TaskConfig {
        landmark_lat: 39.951,
        landmark_lon: 116.451,
        landmark_radius_km: 0.1,
        ..TaskConfig::default()
    };
    let db = GeolifeMongo::connect(&url, "geolife_test")
        .await
        .unwrap()
        .with_parameters(TaskParameters::from(&tasks));

    let first = db.ingest(&reader).await.unwrap();
    let first_counts = db.counts().await.unwrap();
    let second = db.ingest(&reader).await.unwrap();
    let second_counts = db.counts().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_counts, second_counts);
    assert_eq!(first_counts, (2, 3, 6));

    for task in MongoTask::ALL {
        let report = db.run(task).await.unwrap();
        assert!(!report.title.is_empty(), "task {}", task.id());
    }

    let counts = db.run(MongoTask::Counts).await.unwrap();
    assert_eq!(counts.table.rows(), &[vec!["2", "3", "6"]]);

    let taxi = db.run(MongoTask::TaxiUsers).await.unwrap();
    assert!(taxi.to_string().contains("010"));

    // First points of 010 and 011 are ~11 m and 6 s apart
    let close = db.run(MongoTask::CloseUsers).await.unwrap();
    assert_eq!(close.table.rows(), &[vec!["2"]]);

    // 50 ft for 010, 20 + 10 ft for 011
    let gained = db.run(MongoTask::AltitudeGain).await.unwrap();
    assert_eq!(
        gained.table.rows(),
        &[vec!["010", "15.24"], vec!["011", "9.14"]]
    );

    // Each user's first activity has a gap well over five minutes
    let invalid = db.run(MongoTask::InvalidActivities).await.unwrap();
    assert_eq!(invalid.table.rows(), &[vec!["010", "1"], vec!["011", "1"]]);

    let favourite = db.run(MongoTask::FavouriteMode).await.unwrap();
    assert_eq!(favourite.table.rows(), &[vec!["010", "taxi"]]);

    let near = db.run(MongoTask::NearLandmark).await.unwrap();
    assert_eq!(near.table.rows(), &[vec!["011"]]);

    db.close().await;
}
