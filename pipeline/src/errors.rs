//! Error types and handling for pipeline operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported encoder type: {0}")]
    UnsupportedEncoder(String),

    #[error("unknown log level: {0}")]
    UnknownLevel(String),

    #[error("invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("error encoding record: {0}")]
    Encoding(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
