use rusqlite;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QrtagError {
    #[error("Connection error: {0}")]
    ConnectionError(String),
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error(
        "Capacity error: payload of {len} bytes does not fit a version {version} symbol at error-correction level {ec_level}"
    )]
    CapacityError {
        len: usize,
        version: i16,
        ec_level: char,
    },
    #[error("Encoding error: {0}")]
    EncodingError(String),
    #[error("I/O error at {}: {source}", path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl QrtagError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        QrtagError::IoError {
            path: path.into(),
            source,
        }
    }
}
