//! Error types for decoding realtime frames and keys

use thiserror::Error;

/// Errors raised while turning wire data into typed values.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Payload for event '{event}' does not match its schema: {reason}")]
    InvalidPayload { event: String, reason: String },

    #[error("Frame has an empty event name")]
    MissingEvent,

    #[error("Unknown cache key: {0}")]
    UnknownCacheKey(String),

    #[error("Unsupported harvest horizon: {0} days")]
    UnsupportedHorizon(u32),
}

pub type CoreResult<T> = Result<T, FrameError>;
