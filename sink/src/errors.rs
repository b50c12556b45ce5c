//! Error types and handling for sink operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("the batching sink must be created from within a tokio runtime")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error(transparent)]
    Pipeline(#[from] batchlog_pipeline::errors::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
