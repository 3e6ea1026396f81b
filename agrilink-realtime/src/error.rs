//! Error types for the realtime channel.

use agrilink_core::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Connection refused: {0}")]
    Refused(String),
    #[error("Handshake did not complete within {0}ms")]
    HandshakeTimeout(u64),
    #[error("Connection closed by peer")]
    ConnectionClosed,
    #[error("Channel is not connected")]
    NotConnected,
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl From<tokio_tungstenite::tungstenite::Error> for ChannelError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}
