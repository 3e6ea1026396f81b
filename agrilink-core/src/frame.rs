//! Wire frames exchanged over the realtime connection.
//!
//! Inbound frames are `{ "event", "payload", "connection_id"? }` JSON text
//! frames. Outbound frames drop the connection id.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{CoreResult, FrameError};

/// Close code of an intentional, normal closure. Never triggers a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// A frame pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub payload: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl InboundFrame {
    /// Parse a text frame. An empty event name is rejected.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let frame: InboundFrame = serde_json::from_str(text)?;
        if frame.event.trim().is_empty() {
            return Err(FrameError::MissingEvent);
        }
        Ok(frame)
    }
}

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub event: String,
    pub payload: JsonValue,
}

impl OutboundFrame {
    pub fn new(event: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }

    pub fn to_text(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Close code and reason of a finished connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn normal() -> Self {
        Self::new(NORMAL_CLOSURE, "client disconnect")
    }

    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    /// Whether this closure was intentional.
    pub fn is_normal(&self) -> bool {
        self.code == NORMAL_CLOSURE
    }
}
