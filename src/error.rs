//! Error types shared by ingestion, the two database backends and the CLI.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GeolifeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed trajectory record in {path} at line {line}: {reason}")]
    MalformedTrajectory {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Malformed label in {path} at line {line}")]
    MalformedLabel { path: PathBuf, line: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("MySQL error: {0}")]
    MySql(#[from] sqlx::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("BSON decoding error: {0}")]
    BsonDe(#[from] mongodb::bson::de::Error),

    #[error("BSON field error: {0}")]
    BsonField(#[from] mongodb::bson::document::ValueAccessError),

    #[error("Unexpected inserted id: {0}")]
    InsertedId(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),
}

impl GeolifeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GeolifeError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GeolifeError>;
