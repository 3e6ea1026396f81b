//! WebSocket transport over tokio-tungstenite.

use agrilink_core::CloseInfo;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::borrow::Cow;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::{Connection, Connector, Frame, FrameSink, FrameStream};
use crate::error::ChannelError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the server closed without a status.
const NO_STATUS_RECEIVED: u16 = 1005;

#[derive(Debug, Clone, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
        let (stream, response) = tokio_tungstenite::connect_async(url).await?;
        debug!(status = response.status().as_u16(), "WebSocket handshake complete");
        let (sink, stream) = stream.split();
        Ok(Connection {
            sink: Box::new(WsSink { inner: sink }),
            stream: Box::new(WsFrames { inner: stream }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Close(close) => Message::Close(Some(CloseFrame {
                code: CloseCode::from(close.code),
                reason: Cow::Owned(close.reason),
            })),
        };
        self.inner.send(message).await?;
        Ok(())
    }
}

struct WsFrames {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameStream for WsFrames {
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text))),
                Ok(Message::Close(frame)) => {
                    let close = frame
                        .map(|f| CloseInfo::new(u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or_else(|| CloseInfo::new(NO_STATUS_RECEIVED, ""));
                    return Some(Ok(Frame::Close(close)));
                }
                Ok(Message::Binary(data)) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}
