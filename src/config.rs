//! Runtime configuration.
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables (a `.env` file is loaded first if present).

use std::{
    env,
    path::{Path, PathBuf},
};

use serde_derive::Deserialize;

use crate::error::{GeolifeError, Result};

/// 6 header lines + 2500 data lines.
pub const DEFAULT_MAX_TRAJECTORY_LINES: usize = 2506;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub path: PathBuf,
    pub max_trajectory_lines: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dataset"),
            max_trajectory_lines: DEFAULT_MAX_TRAJECTORY_LINES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MySqlConfig {
    pub url: String,
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            url: "mysql://root@localhost:3306/geolife".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "geolife".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    /// Components (`MySql`, `Proximity`, ...) whose output is muted.
    pub muted: Vec<String>,
    /// Components logging at verbose level regardless of `verbose`.
    pub verbose_components: Vec<String>,
}

/// Inputs of the parameterised document tasks (7 and 10).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub walk_user: String,
    pub walk_year: i32,
    pub walk_mode: String,
    pub landmark_lat: f64,
    pub landmark_lon: f64,
    pub landmark_radius_km: f64,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            walk_user: "112".to_string(),
            walk_year: 2008,
            walk_mode: "walk".to_string(),
            // Forbidden City, Beijing
            landmark_lat: 39.916,
            landmark_lon: 116.397,
            landmark_radius_km: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset: DatasetConfig,
    pub mysql: MySqlConfig,
    pub mongodb: MongoConfig,
    pub logging: LoggingConfig,
    pub tasks: TaskConfig,
}

impl Config {
    /// Load `path` if it exists, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = if path.exists() {
            let text =
                std::fs::read_to_string(path).map_err(|e| GeolifeError::io(path, e))?;
            Self::from_toml(&text)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| GeolifeError::Config(e.to_string()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = env::var("GEOLIFE_DATASET") {
            self.dataset.path = PathBuf::from(path);
        }
        if let Ok(url) = env::var("GEOLIFE_MYSQL_URL") {
            self.mysql.url = url;
        }
        if let Ok(uri) = env::var("GEOLIFE_MONGODB_URI") {
            self.mongodb.uri = uri;
        }
        if let Ok(database) = env::var("GEOLIFE_MONGODB_DATABASE") {
            self.mongodb.database = database;
        }
        if let Ok(verbose) = env::var("GEOLIFE_VERBOSE") {
            self.logging.verbose = verbose.parse().map_err(|_| {
                GeolifeError::Config(format!("GEOLIFE_VERBOSE must be true or false, got {verbose}"))
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.dataset.max_trajectory_lines, 2506);
        assert_eq!(config.mongodb.database, "geolife");
        assert!(!config.logging.verbose);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [dataset]
            path = "/data/geolife"

            [mongodb]
            database = "assignment3"
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset.path, PathBuf::from("/data/geolife"));
        assert_eq!(config.dataset.max_trajectory_lines, 2506);
        assert_eq!(config.mongodb.database, "assignment3");
        assert_eq!(config.mongodb.uri, "mongodb://localhost:27017");
    }

    #[test]
    fn test_task_section_overrides_document_task_inputs() {
        let config = Config::from_toml(
            r#"
            [tasks]
            walk_user = "010"
            walk_year = 2009
            landmark_radius_km = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.tasks.walk_user, "010");
        assert_eq!(config.tasks.walk_year, 2009);
        assert_eq!(config.tasks.walk_mode, "walk");
        assert_eq!(config.tasks.landmark_lat, 39.916);
        assert_eq!(config.tasks.landmark_radius_km, 2.5);
    }

    #[test]
    fn test_logging_component_lists() {
        let config = Config::from_toml(
            r#"
            [logging]
            muted = ["Ingestion"]
            verbose_components = ["Proximity"]
            "#,
        )
        .unwrap();

        assert!(!config.logging.verbose);
        assert_eq!(config.logging.muted, vec!["Ingestion"]);
        assert_eq!(config.logging.verbose_components, vec!["Proximity"]);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[dataset\npath = 1").unwrap_err();
        assert!(matches!(err, GeolifeError::Config(_)));
    }
}
