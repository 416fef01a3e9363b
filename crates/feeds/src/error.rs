use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("no temp pattern found")]
    NoTemperature,

    #[error("could not parse temperature {0:?}")]
    BadTemperature(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("response too long: {0} bytes")]
    LongResponse(u64),

    #[error("not an IP address: {0:?}")]
    InvalidIp(String),

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FeedError>;
