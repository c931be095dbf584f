use crate::utils::LoadConfigError;
use tokio_tungstenite::tungstenite;

/// An inbound stream frame that could not be turned into a tick.
#[derive(Debug, thiserror::Error)]
pub enum MalformedMessageError {
    #[error("invalid stream payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("field `{field}` is not numeric: {value}")]
    NonNumeric { field: &'static str, value: String },
    #[error("field `{field}` is not an integer: {value}")]
    NonInteger { field: &'static str, value: String },
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("connection timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),
    #[error(transparent)]
    WebSocket(#[from] tungstenite::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("graph query error: {0}")]
    Graph(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Malformed(#[from] MalformedMessageError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Config(#[from] LoadConfigError),
}
