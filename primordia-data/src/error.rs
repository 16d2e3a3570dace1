use crate::model::RegionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// All errors generated in `primordia-data`.
///
/// Every variant is a network-level failure from the point of view of the dashboard: the caller
/// decides whether it is fatal (startup) or transient (poll).
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),

    #[error("request to {endpoint} failed: {message}")]
    Transport { endpoint: String, message: String },

    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} responded with HTTP {status}")]
    Status { endpoint: String, status: u16 },

    #[error("failed to decode {endpoint} response: {message}")]
    Decode { endpoint: String, message: String },

    #[error("malformed {endpoint} response: {message}")]
    Malformed { endpoint: String, message: String },

    #[error("signals requested for {requested} but backend answered for {received}")]
    RegionMismatch {
        requested: RegionId,
        received: RegionId,
    },
}

impl DataError {
    /// Determine if retrying the same request later may succeed.
    ///
    /// Client errors (4xx) and shape errors are stable until the backend changes, everything else
    /// is worth another attempt on the next poll.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_transient(&self) -> bool {
        match self {
            DataError::Transport { .. } | DataError::Timeout { .. } => true,
            DataError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(endpoint: &str, error: reqwest::Error) -> Self {
        let endpoint = endpoint.to_string();
        if error.is_timeout() {
            DataError::Timeout { endpoint }
        } else if let Some(status) = error.status() {
            DataError::Status {
                endpoint,
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            DataError::Decode {
                endpoint,
                message: error.to_string(),
            }
        } else {
            DataError::Transport {
                endpoint,
                message: error.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for DataError {
    fn from(value: url::ParseError) -> Self {
        Self::InvalidUrl(value.to_string())
    }
}
