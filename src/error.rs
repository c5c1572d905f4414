//! Error types for the conversion dashboard

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Missing feature in query: {0}")]
    MissingFeature(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors caused by the caller's input rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownColumn(_) | Error::MissingFeature(_) | Error::InvalidQuery(_)
        )
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Dataset(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}
