use std::fmt;

use reqwest::StatusCode;

pub type Result<T> = std::result::Result<T, EtlError>;

/// Which of the two sequential API requests an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    /// `GET /points/{lat},{lon}`
    Points,
    /// `GET {properties.forecastHourly}`
    Hourly,
}

impl Hop {
    pub fn as_str(&self) -> &'static str {
        match self {
            Hop::Points => "points",
            Hop::Hourly => "hourly forecast",
        }
    }
}

impl fmt::Display for Hop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EtlError {
    /// Upstream answered with a non-2xx status.
    #[error("{hop} request to {url} failed with status {status}")]
    Transport {
        hop: Hop,
        url: String,
        status: StatusCode,
    },

    /// The request never produced a response (connect failure, timeout, unreadable body).
    #[error("{hop} request to {url} could not be completed: {source}")]
    Request {
        hop: Hop,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Malformed API response ({hop}): missing/invalid '{field}'")]
    MalformedResponse { hop: Hop, field: &'static str },

    #[error("Missing expected columns in transformed rows: {missing:?}")]
    MissingColumns { missing: Vec<&'static str> },

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl EtlError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        EtlError::Config { message: message.into() }
    }
}
