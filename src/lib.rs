use std::str::FromStr;

use config::Config;
use data_types::{geolife::IngestionSummary, report::TaskReport};
use database::{
    mongo_db::{GeolifeMongo, MongoTask, TaskParameters},
    mysql_db::{GeolifeSql, SqlTask},
};
use error::Result;
use ingestion::DatasetReader;

pub mod config;
pub mod data_types;
pub mod database;
pub mod error;
pub mod ingestion;
pub mod processors;
pub mod util;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Sql,
    Mongo,
}

enum Backend {
    Sql(GeolifeSql),
    Mongo(GeolifeMongo),
}

/// Parse task ids for a backend. `all` expands to every task in order.
fn parse_tasks<T: FromStr<Err = error::GeolifeError> + Copy>(ids: &[String], all: &[T]) -> Result<Vec<T>> {
    if ids.iter().any(|id| id.eq_ignore_ascii_case("all")) {
        return Ok(all.to_vec());
    }

    ids.iter().map(|id| id.parse()).collect()
}

/// Owns one backend connection for the duration of a run.
pub struct App {
    config: Config,
    backend: Backend,
}

impl App {
    const CC: &'static str = "App";

    pub async fn connect(config: Config, kind: BackendKind) -> Result<Self> {
        let backend = match kind {
            BackendKind::Sql => Backend::Sql(GeolifeSql::connect(&config.mysql.url).await?),
            BackendKind::Mongo => Backend::Mongo(
                GeolifeMongo::connect(&config.mongodb.uri, &config.mongodb.database)
                    .await?
                    .with_parameters(TaskParameters::from(&config.tasks)),
            ),
        };

        logln!("Connected to the {:?} backend", kind);
        Ok(Self { config, backend })
    }

    pub fn dataset_reader(&self) -> DatasetReader {
        DatasetReader::new(
            self.config.dataset.path.clone(),
            self.config.dataset.max_trajectory_lines,
        )
    }

    pub async fn ingest(&mut self) -> Result<IngestionSummary> {
        let reader = self.dataset_reader();
        logln!("Ingesting {}", self.config.dataset.path.display());

        match &mut self.backend {
            Backend::Sql(db) => db.ingest(&reader).await,
            Backend::Mongo(db) => db.ingest(&reader).await,
        }
    }

    pub async fn show(&mut self) -> Result<Vec<TaskReport>> {
        match &mut self.backend {
            Backend::Sql(db) => db.show().await,
            Backend::Mongo(db) => db.show().await,
        }
    }

    /// Run the named tasks in order. Every id is validated before the first runs.
    pub async fn run_tasks(&mut self, ids: &[String]) -> Result<Vec<TaskReport>> {
        let mut reports = Vec::new();

        match &mut self.backend {
            Backend::Sql(db) => {
                for task in parse_tasks(ids, &SqlTask::ALL)? {
                    logln!("Running task {}", task.id());
                    reports.push(db.run(task).await?);
                }
            }
            Backend::Mongo(db) => {
                for task in parse_tasks(ids, &MongoTask::ALL)? {
                    logln!("Running task {}", task.id());
                    reports.push(db.run(task).await?);
                }
            }
        }

        Ok(reports)
    }

    pub async fn close(self) -> Result<()> {
        match self.backend {
            Backend::Sql(db) => db.close().await?,
            Backend::Mongo(db) => db.close().await,
        }

        logln!("Connection closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_parse_tasks_all() {
        let tasks = parse_tasks(&ids(&["all"]), &SqlTask::ALL).unwrap();
        assert_eq!(tasks, SqlTask::ALL.to_vec());
    }

    #[test]
    fn test_parse_tasks_keeps_order() {
        let tasks = parse_tasks(&ids(&["12", "6b2", "1"]), &MongoTask::ALL).unwrap();
        assert_eq!(
            tasks,
            vec![
                MongoTask::CloseUsers,
                MongoTask::BusiestYearByHoursSplit,
                MongoTask::Counts
            ]
        );
    }

    #[test]
    fn test_parse_tasks_rejects_unknown() {
        assert!(parse_tasks(&ids(&["1", "6b2"]), &SqlTask::ALL).is_err());
    }
}
