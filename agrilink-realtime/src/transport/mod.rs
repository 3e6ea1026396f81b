//! Transport seam between the channel and a concrete socket.
//!
//! A [`Connector`] opens a [`Connection`], already split into a write half
//! and a read half so the channel can pump both from one task.

use agrilink_core::CloseInfo;
use async_trait::async_trait;

use crate::error::ChannelError;

pub mod memory;
pub mod tungstenite;

/// A frame as the channel sees it. Pings, pongs and binary frames are
/// handled or skipped by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close(CloseInfo),
}

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait FrameStream: Send {
    /// `None` once the peer went away without sending a close frame.
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>>;
}

pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub stream: Box<dyn FrameStream>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Perform the handshake against `url` (credentials already appended).
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError>;
}
