use async_trait::async_trait;
use shared::{
    error::ProtocolError,
    protocol::{RequestResponse, SceneEvent, SceneRequest},
};
use thiserror::Error;
use tokio::sync::broadcast;

pub mod auth;
mod obs;
pub mod retry;

pub use obs::{ObsClient, ObsConnectOptions};
pub use retry::{retry_connect, RetryPolicy};

#[derive(Debug, Error)]
pub enum SceneClientError {
    #[error("{request_type} failed with status {code}: {comment}")]
    RequestFailed {
        request_type: String,
        code: u32,
        comment: String,
    },
    #[error("batch returned {actual} results for {expected} requests")]
    BatchLengthMismatch { expected: usize, actual: usize },
    #[error("scene connection closed")]
    ConnectionClosed,
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connection refused by {url}")]
    Refused { url: String },
    #[error("invalid scene url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("server requires authentication but no password is configured")]
    PasswordRequired,
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("server closed the session during handshake: {0}")]
    Closed(String),
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<ConnectError>,
    },
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ConnectError {
    /// Only a refused connection is worth waiting out; everything else is
    /// a configuration problem.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectError::Refused { .. })
    }
}

/// Request/response access to the production tool's scene graph.
#[async_trait]
pub trait SceneTransport: Send + Sync {
    /// Issue one request. A non-success status becomes `RequestFailed`.
    async fn call(&self, request: SceneRequest) -> Result<RequestResponse, SceneClientError>;

    /// Issue all requests in one batch round trip. Results come back in
    /// request order and carry their own status; failed items are not
    /// turned into errors here.
    async fn call_batch(
        &self,
        requests: Vec<SceneRequest>,
    ) -> Result<Vec<RequestResponse>, SceneClientError>;

    fn subscribe_events(&self) -> broadcast::Receiver<SceneEvent>;
}

/// Map a failed request status to `RequestFailed`, pass successes through.
pub fn ensure_success(response: RequestResponse) -> Result<RequestResponse, SceneClientError> {
    if response.is_success() {
        return Ok(response);
    }
    Err(SceneClientError::RequestFailed {
        comment: response
            .request_status
            .comment
            .unwrap_or_else(|| "no comment".to_string()),
        code: response.request_status.code,
        request_type: response.request_type,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
