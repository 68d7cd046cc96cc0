use barter_integration::error::SocketError;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

/// All errors generated in `oanda-data`.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("unsupported granularity code: {0}")]
    UnsupportedGranularity(String),

    #[error(
        "transport error (status {}): {reason}",
        .status.map_or_else(|| "none".to_string(), |status| status.to_string())
    )]
    Transport {
        status: Option<StatusCode>,
        reason: String,
    },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid time range: start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("invalid instant: {0}")]
    InvalidInstant(String),

    #[error("instrument name must not be empty")]
    EmptyInstrument,

    #[error("invalid instrument name '{0}': expected ASCII letters, digits, '_', '-' or '.'")]
    InvalidInstrument(String),

    #[error("missing required configuration value: {0}")]
    MissingConfig(&'static str),

    #[error("invalid configuration value for {name}: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    #[error("deadline exceeded after {completed} of {total} chunk requests")]
    DeadlineExceeded { completed: usize, total: usize },
}

impl DataError {
    /// HTTP status carried by a [`DataError::Transport`], if the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<SocketError> for DataError {
    fn from(error: SocketError) -> Self {
        Self::Transport {
            status: None,
            reason: error.to_string(),
        }
    }
}
