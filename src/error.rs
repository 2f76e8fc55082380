use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single call against the chat endpoint.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("could not reach {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("chat endpoint error {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("response has no readable body")]
    BodyMissing,

    #[error("stream interrupted: {0}")]
    Transport(String),

    #[error("malformed UTF-8 in response ({len} invalid bytes)")]
    Decode { len: usize },

    #[error("stream exceeded {secs}s")]
    Timeout { secs: u64 },

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("unexpected response body: {0}")]
    InvalidResponse(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl StreamError {
    /// True when nothing was read from the server before the call failed.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StreamError::Connection { .. } | StreamError::Status { .. } | StreamError::BodyMissing
        )
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        StreamError::Transport(err.to_string())
    }
}

pub type StreamResult<T> = Result<T, StreamError>;

/// Local rejection of a submission. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,

    #[error("limit of {limit} queries reached for this session")]
    LimitReached { limit: u32 },

    #[error("a response is still streaming")]
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
