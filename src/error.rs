use thiserror::Error;

/// Error types for the reverb-native library
#[derive(Error, Debug)]
pub enum ReverbError {
    #[error("WebSocket is not connected")]
    NotConnected,
    #[error("Failed to connect: {0}")]
    ConnectError(String),
    #[error("Subscribe failed: {0}")]
    SubscribeError(String),
    #[error("Unsubscribe failed: {0}")]
    UnsubscribeError(String),
    #[error("Removing listeners failed: {0}")]
    RemoveAllListenersError(String),
    #[error("No auth endpoint configured")]
    AuthEndpointNotConfigured,
    #[error("Channel authentication failed: {0}")]
    AuthFailed(String),
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Send error: {0}")]
    SendError(String),
    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl ReverbError {
    /// Stable error code a host bridge can use when rejecting a pending call.
    pub fn code(&self) -> &'static str {
        match self {
            ReverbError::NotConnected => "WEBSOCKET_NOT_CONNECTED",
            ReverbError::ConnectError(_) | ReverbError::WebSocketError(_) => {
                "WEBSOCKET_CONNECT_ERROR"
            }
            ReverbError::SubscribeError(_) => "SUBSCRIBE_ERROR",
            ReverbError::UnsubscribeError(_) => "UNSUBSCRIBE_ERROR",
            ReverbError::RemoveAllListenersError(_) => "REMOVE_ALL_LISTENERS_ERROR",
            ReverbError::AuthEndpointNotConfigured => "AUTH_ENDPOINT_NOT_SET",
            ReverbError::AuthFailed(_) | ReverbError::HttpError(_) => "AUTH_FAILED",
            ReverbError::MalformedFrame(_) | ReverbError::JsonError(_) => "MALFORMED_FRAME",
            ReverbError::InvalidConfig(_) | ReverbError::UrlParseError(_) => "INVALID_CONFIG",
            ReverbError::SendError(_) => "SEND_ERROR",
        }
    }
}
