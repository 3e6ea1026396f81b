//! In-process loopback transport.
//!
//! [`MemoryConnector`] hands every accepted connection's server half to a
//! [`MemoryListener`], which lets demos and tests play the backend: push
//! frames, read what the client sent, close with a chosen code, fail the
//! read side with a transport error or drop the connection outright.
//! Connection attempts can be refused on demand and are recorded with the
//! (tokio) instant they happened at.

use agrilink_core::{CloseInfo, InboundFrame};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{Connection, Connector, Frame, FrameSink, FrameStream};
use crate::error::ChannelError;

/// One call to [`Connector::connect`].
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub url: String,
    pub at: Instant,
    pub accepted: bool,
}

struct ConnectorState {
    refuse: bool,
    attempts: Vec<ConnectAttempt>,
}

#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
    accepted: mpsc::UnboundedSender<MemoryPeer>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryListener) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState {
                refuse: false,
                attempts: Vec::new(),
            })),
            accepted,
        };
        (connector, MemoryListener { incoming })
    }

    /// Refuse (or accept again) subsequent connection attempts.
    pub fn refuse_connections(&self, refuse: bool) {
        lock(&self.state).refuse = refuse;
    }

    pub fn attempts(&self) -> Vec<ConnectAttempt> {
        lock(&self.state).attempts.clone()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Connection, ChannelError> {
        let refuse = {
            let mut state = lock(&self.state);
            let refuse = state.refuse;
            state.attempts.push(ConnectAttempt {
                url: url.to_string(),
                at: Instant::now(),
                accepted: !refuse,
            });
            refuse
        };
        if refuse {
            return Err(ChannelError::Refused(format!("{} refused the connection", url)));
        }

        let (to_client, client_rx) = mpsc::unbounded_channel();
        let (client_tx, from_client) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            url: url.to_string(),
            to_client,
            from_client,
        };
        self.accepted
            .send(peer)
            .map_err(|_| ChannelError::Refused("listener dropped".to_string()))?;

        Ok(Connection {
            sink: Box::new(MemorySink { tx: client_tx }),
            stream: Box::new(MemoryStream { rx: client_rx }),
        })
    }
}

/// Receives the server half of each accepted connection.
pub struct MemoryListener {
    incoming: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }
}

/// Server half of one in-memory connection. Dropping it drops the
/// connection without a close frame.
pub struct MemoryPeer {
    url: String,
    to_client: mpsc::UnboundedSender<Result<Frame, ChannelError>>,
    from_client: mpsc::UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// URL the client connected with, credentials included.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn push_text(&self, text: impl Into<String>) -> Result<(), ChannelError> {
        self.to_client
            .send(Ok(Frame::Text(text.into())))
            .map_err(|_| ChannelError::ConnectionClosed)
    }

    pub fn push(&self, frame: &InboundFrame) -> Result<(), ChannelError> {
        let text = serde_json::to_string(frame).map_err(agrilink_core::FrameError::from)?;
        self.push_text(text)
    }

    pub fn close(&self, code: u16, reason: impl Into<String>) -> Result<(), ChannelError> {
        self.to_client
            .send(Ok(Frame::Close(CloseInfo::new(code, reason))))
            .map_err(|_| ChannelError::ConnectionClosed)
    }

    /// Make the client's next read fail with a transport error.
    pub fn fail(&self, reason: impl Into<String>) -> Result<(), ChannelError> {
        self.to_client
            .send(Err(ChannelError::Transport(reason.into())))
            .map_err(|_| ChannelError::ConnectionClosed)
    }

    /// Next frame sent by the client, `None` once the client side is gone.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_client.recv().await
    }
}

struct MemorySink {
    tx: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<(), ChannelError> {
        self.tx.send(frame).map_err(|_| ChannelError::ConnectionClosed)
    }
}

struct MemoryStream {
    rx: mpsc::UnboundedReceiver<Result<Frame, ChannelError>>,
}

#[async_trait]
impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, ChannelError>> {
        self.rx.recv().await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_through_peer() {
        let (connector, mut listener) = MemoryConnector::new();
        let mut connection = connector.connect("mem://push").await.expect("connect");
        let mut peer = listener.accept().await.expect("peer");
        assert_eq!(peer.url(), "mem://push");

        peer.push_text("hello").expect("push");
        let frame = connection.stream.next_frame().await.expect("frame").expect("ok");
        assert_eq!(frame, Frame::Text("hello".to_string()));

        connection
            .sink
            .send(Frame::Text("reply".to_string()))
            .await
            .expect("send");
        assert_eq!(peer.recv().await, Some(Frame::Text("reply".to_string())));

        peer.fail("reset by peer").expect("fail");
        assert!(matches!(
            connection.stream.next_frame().await,
            Some(Err(ChannelError::Transport(_)))
        ));

        drop(peer);
        assert!(connection.stream.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_refused_attempts_are_recorded() {
        let (connector, _listener) = MemoryConnector::new();
        connector.refuse_connections(true);
        assert!(connector.connect("mem://push").await.is_err());

        let attempts = connector.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].accepted);
    }
}
