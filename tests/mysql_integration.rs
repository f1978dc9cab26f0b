//! MySQL round trips.
//!
//! Everything runs in one test against a disposable database, which it will
//! clear: it drops and recreates its tables.
//! Run with: GEOLIFE_TEST_MYSQL_URL=mysql://root@localhost:3306/geolife_test cargo test

use geolife_db::{
    database::mysql_db::{GeolifeSql, SqlTask},
    ingestion::DatasetReader,
};

mod common;
use common::FixtureDataset;

fn fixture() -> FixtureDataset {
    let fixture = FixtureDataset::new();
    fixture
        .labeled_ids(&["010"])
        .labels("010", &[("2008/03/28 14:52:54", "2008/03/28 15:59:59", "bus")])
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
    let url = require_db!("GEOLIFE_TEST_MYSQL_URL");
    let fixture = fixture();
    let reader = DatasetReader::new(fixture.root(), 2506);

    let mut db = GeolifeSql::connect(&url).await.unwrap();

    let first = db.ingest(&reader).await.unwrap();
    let first_counts = db.counts().await.unwrap();
    let second = db.ingest(&reader).await.unwrap();
    let second_counts = db.counts().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_counts, second_counts);
    assert_eq!(first_counts, (2, 3, 6));

    for task in SqlTask::ALL {
        let report = db.run(task).await.unwrap();
        assert!(!report.title.is_empty(), "task {}", task.id());
    }

    let counts = db.run(SqlTask::Counts).await.unwrap();
    assert_eq!(counts.table.rows(), &[vec!["2", "3", "6"]]);

    let bus = db.run(SqlTask::BusUsers).await.unwrap();
    assert_eq!(bus.table.rows(), &[vec!["010"]]);

    // First points of 010 and 011 are ~11 m and 6 s apart
    let close = db.run(SqlTask::CloseUsers).await.unwrap();
    assert_eq!(close.table.rows(), &[vec!["2"]]);

    // 50 ft for 010, 20 + 10 ft for 011
    let gained = db.run(SqlTask::AltitudeGain).await.unwrap();
    assert_eq!(
        gained.table.rows(),
        &[vec!["010", "15.24"], vec!["011", "9.14"]]
    );

    // Each user's first activity has a gap well over five minutes
    let invalid = db.run(SqlTask::InvalidActivities).await.unwrap();
    assert_eq!(invalid.table.rows(), &[vec!["010", "1"], vec!["011", "1"]]);

    let favourite = db.run(SqlTask::FavouriteMode).await.unwrap();
    assert_eq!(favourite.table.rows(), &[vec!["010", "bus"]]);

    db.close().await.unwrap();
}
