use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed detection: {0}")]
    MalformedDetection(String),

    #[error("No data available")]
    NoDataAvailable,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0} has no location columns")]
    NoLocationColumns(std::path::PathBuf),

    #[error("Detection source error: {0}")]
    Source(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Timestamp Error: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

impl Error {
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedDetection(msg.into())
    }

    pub fn invalid_filter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn source<S: Into<String>>(msg: S) -> Self {
        Self::Source(msg.into())
    }
}
