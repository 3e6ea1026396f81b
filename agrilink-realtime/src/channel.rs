//! Realtime channel with reconnect backoff.
//!
//! ## Lifecycle
//!
//! `Disconnected -> Connecting -> Connected -> Disconnected`
//!
//! - `connect()` performs the handshake inline, then hands the connection
//!   to a supervisor task that pumps frames in both directions.
//! - A handshake still pending after `handshake_timeout_ms` fails like a
//!   refused one. Dropping a `connect()` future mid-handshake puts the
//!   state back to `Disconnected`.
//! - Any close other than 1000 makes the supervisor sleep for the next
//!   backoff delay and reconnect, up to `max_attempts` times in a row.
//! - `disconnect()` closes with 1000, drops every subscriber and resets the
//!   state. Tasks of a previous session notice the session counter moved
//!   and stop without touching state or subscribers.

use agrilink_core::{CloseInfo, EventKind, InboundFrame, OutboundFrame, RealtimeEvent};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backoff::saturating_millis;
use crate::config::ChannelConfig;
use crate::credentials::{endpoint_url, CredentialStore};
use crate::error::ChannelError;
use crate::registry::{Callback, SubscriberRegistry, Subscription, Topic};
use crate::state::{ConnectionState, ConnectionStatus};
use crate::transport::{Connection, Connector, Frame};

enum Outbound {
    Text(String),
    Close(CloseInfo),
}

type LiveConnection = (Connection, mpsc::UnboundedReceiver<Outbound>);

#[derive(Default)]
struct Control {
    session: u64,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    supervisor: Option<JoinHandle<()>>,
}

struct ChannelInner {
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    credentials: Arc<dyn CredentialStore>,
    registry: SubscriberRegistry,
    state: watch::Sender<ConnectionState>,
    control: Mutex<Control>,
}

/// Handle to the realtime channel. Clones share one connection.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

impl RealtimeChannel {
    pub fn new(
        config: ChannelConfig,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                config,
                connector,
                credentials,
                registry: SubscriberRegistry::new(),
                state: watch::Sender::new(ConnectionState::default()),
                control: Mutex::new(Control::default()),
            }),
        }
    }

    /// Open the connection. No-op while connected or connecting.
    ///
    /// A failed handshake is returned to the caller and also enters the
    /// reconnect schedule. Calling this after the reconnect budget ran out
    /// starts a fresh budget.
    pub async fn connect(&self) -> Result<(), ChannelError> {
        let session = {
            let mut control = lock(&self.inner.control);
            let status = self.inner.state.borrow().status;
            if status != ConnectionStatus::Disconnected {
                debug!(status = ?status, "Connect ignored, channel already active");
                return Ok(());
            }
            if let Some(pending) = control.supervisor.take() {
                pending.abort();
            }
            control.session += 1;
            self.inner.state.send_modify(|state| {
                state.status = ConnectionStatus::Connecting;
                state.reconnect_attempts = 0;
                state.retries_exhausted = false;
            });
            control.session
        };

        let guard = HandshakeGuard {
            inner: &self.inner,
            session,
            armed: true,
        };
        let opened = self.inner.open(session).await;
        guard.disarm();

        match opened {
            Ok(mut connection) => {
                match self.inner.activate(session) {
                    Some(outbound) => self.inner.spawn_supervisor(session, Some((connection, outbound))),
                    None => {
                        // disconnect() ran while the handshake was in flight.
                        let _ = connection.sink.send(Frame::Close(CloseInfo::normal())).await;
                    }
                }
                Ok(())
            }
            Err(err) => {
                if self.inner.handshake_failed(session, &err) {
                    self.inner.spawn_supervisor(session, None);
                }
                Err(err)
            }
        }
    }

    /// Close with code 1000, drop all subscribers and reset the state.
    pub fn disconnect(&self) {
        let (outbound, supervisor) = {
            let mut control = lock(&self.inner.control);
            control.session += 1;
            (control.outbound.take(), control.supervisor.take())
        };
        match outbound {
            // The pump sends the close frame and exits on its own.
            Some(outbound) => {
                let _ = outbound.send(Outbound::Close(CloseInfo::normal()));
            }
            None => {
                if let Some(supervisor) = supervisor {
                    supervisor.abort();
                }
            }
        }
        self.inner.registry.clear();
        self.inner.state.send_replace(ConnectionState::default());
        info!("Realtime channel disconnected");
    }

    /// Fire-and-forget send. Dropped with a warning unless connected.
    pub fn send(&self, event: &str, payload: JsonValue) -> Result<(), ChannelError> {
        let text = OutboundFrame::new(event, payload).to_text()?;
        let control = lock(&self.inner.control);
        let connected = self.inner.state.borrow().is_connected();
        match (&control.outbound, connected) {
            (Some(outbound), true) => outbound
                .send(Outbound::Text(text))
                .map_err(|_| ChannelError::NotConnected),
            _ => {
                warn!(event = event, "Dropping outbound event, channel not connected");
                Err(ChannelError::NotConnected)
            }
        }
    }

    pub fn subscribe(&self, topic: Topic, callback: Callback) -> Subscription {
        self.inner.registry.subscribe(topic, callback)
    }

    /// Subscribe to one event kind.
    pub fn on<F>(&self, kind: EventKind, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.subscribe(Topic::Kind(kind), Arc::new(callback))
    }

    /// Subscribe to every event.
    pub fn on_any<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.subscribe(Topic::All, Arc::new(callback))
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }
}

impl ChannelInner {
    fn is_current(&self, session: u64) -> bool {
        lock(&self.control).session == session
    }

    fn spawn_supervisor(self: &Arc<Self>, session: u64, pending: Option<LiveConnection>) {
        let inner = Arc::clone(self);
        let handle = tokio::spawn(inner.supervise(session, pending));
        let mut control = lock(&self.control);
        if control.session == session {
            control.supervisor = Some(handle);
        }
    }

    async fn open(&self, session: u64) -> Result<Connection, ChannelError> {
        {
            let control = lock(&self.control);
            if control.session != session {
                return Err(ChannelError::NotConnected);
            }
            self.state
                .send_modify(|state| state.status = ConnectionStatus::Connecting);
        }
        let token = self.credentials.bearer_token();
        let url = endpoint_url(&self.config.endpoint, token.as_deref());
        debug!(
            endpoint = %self.config.endpoint,
            authenticated = token.is_some(),
            "Opening realtime connection"
        );
        let timeout = self.config.handshake_timeout();
        match tokio::time::timeout(timeout, self.connector.connect(&url)).await {
            Ok(opened) => opened,
            Err(_) => Err(ChannelError::HandshakeTimeout(self.config.handshake_timeout_ms)),
        }
    }

    /// Drives one session: pump the live connection, then back off and
    /// reconnect until closed normally, superseded, or out of attempts.
    async fn supervise(self: Arc<Self>, session: u64, mut pending: Option<LiveConnection>) {
        loop {
            if let Some((connection, outbound)) = pending.take() {
                let close = self.run_connection(session, connection, outbound).await;
                if !self.connection_closed(session, close) {
                    return;
                }
            }

            let Some(delay) = self.next_reconnect_delay(session) else {
                return;
            };
            tokio::time::sleep(delay).await;
            if !self.is_current(session) {
                return;
            }

            match self.open(session).await {
                Ok(mut connection) => match self.activate(session) {
                    Some(outbound) => pending = Some((connection, outbound)),
                    None => {
                        let _ = connection.sink.send(Frame::Close(CloseInfo::normal())).await;
                        return;
                    }
                },
                Err(err) => {
                    if !self.handshake_failed(session, &err) {
                        return;
                    }
                }
            }
        }
    }

    /// Mark the session connected and announce it. `None` when the session
    /// was superseded during the handshake.
    fn activate(&self, session: u64) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        {
            let mut control = lock(&self.control);
            if control.session != session {
                return None;
            }
            control.outbound = Some(outbound_tx);
            self.state.send_modify(|state| {
                state.status = ConnectionStatus::Connected;
                state.reconnect_attempts = 0;
                state.retries_exhausted = false;
                state.connection_id = None;
            });
        }

        info!(endpoint = %self.config.endpoint, "Realtime channel connected");
        self.registry.dispatch(&RealtimeEvent::Connect);
        Some(outbound_rx)
    }

    async fn run_connection(
        &self,
        session: u64,
        connection: Connection,
        mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    ) -> CloseInfo {
        let Connection {
            mut sink,
            mut stream,
        } = connection;

        loop {
            tokio::select! {
                inbound = stream.next_frame() => match inbound {
                    Some(Ok(Frame::Text(text))) => self.handle_text(session, &text),
                    Some(Ok(Frame::Close(close))) => return close,
                    Some(Err(err)) => {
                        warn!(error = %err, "Realtime socket error");
                        if self.is_current(session) {
                            self.registry.dispatch(&RealtimeEvent::Error {
                                message: err.to_string(),
                            });
                        }
                        return CloseInfo::abnormal(err.to_string());
                    }
                    None => return CloseInfo::abnormal("connection lost"),
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(Outbound::Text(text)) => {
                        if let Err(err) = sink.send(Frame::Text(text)).await {
                            warn!(error = %err, "Failed to send realtime frame");
                        }
                    }
                    Some(Outbound::Close(close)) => {
                        let _ = sink.send(Frame::Close(close.clone())).await;
                        return close;
                    }
                    None => return CloseInfo::normal(),
                },
            }
        }
    }

    fn handle_text(&self, session: u64, text: &str) {
        if !self.is_current(session) {
            return;
        }
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Dropping malformed realtime frame");
                return;
            }
        };

        if let Some(connection_id) = frame.connection_id.as_ref() {
            self.state.send_if_modified(|state| {
                if state.connection_id.is_some() {
                    return false;
                }
                debug!(connection_id = %connection_id, "Realtime connection id assigned");
                state.connection_id = Some(connection_id.clone());
                true
            });
        }

        let event = RealtimeEvent::from_frame(&frame);
        if let RealtimeEvent::Untyped { reason, .. } = &event {
            warn!(
                event = %frame.event,
                reason = %reason,
                "Payload does not match its schema, delivering untyped"
            );
        }
        let report = self.registry.dispatch(&event);
        debug!(
            event = %frame.event,
            delivered = report.delivered,
            failed = report.failed,
            "Dispatched realtime event"
        );
    }

    /// Record a finished connection. Returns whether to reconnect.
    fn connection_closed(&self, session: u64, close: CloseInfo) -> bool {
        {
            let mut control = lock(&self.control);
            if control.session != session {
                return false;
            }
            control.outbound = None;
            self.state.send_modify(|state| {
                state.status = ConnectionStatus::Disconnected;
                state.connection_id = None;
                state.last_close = Some(close.clone());
            });
        }

        if close.is_normal() {
            info!(code = close.code, reason = %close.reason, "Realtime connection closed");
        } else {
            warn!(code = close.code, reason = %close.reason, "Realtime connection closed unexpectedly");
        }
        let reconnect = !close.is_normal();
        self.registry.dispatch(&RealtimeEvent::Disconnect(close));
        reconnect
    }

    /// Record a failed handshake. Returns whether to keep retrying.
    fn handshake_failed(&self, session: u64, err: &ChannelError) -> bool {
        let close = CloseInfo::abnormal(err.to_string());
        {
            let control = lock(&self.control);
            if control.session != session {
                return false;
            }
            self.state.send_modify(|state| {
                state.status = ConnectionStatus::Disconnected;
                state.last_close = Some(close.clone());
            });
        }

        warn!(error = %err, "Realtime handshake failed");
        self.registry.dispatch(&RealtimeEvent::Error {
            message: err.to_string(),
        });
        self.registry.dispatch(&RealtimeEvent::Disconnect(close));
        true
    }

    /// Claim the next reconnect attempt, or give up once the budget is spent.
    fn next_reconnect_delay(&self, session: u64) -> Option<Duration> {
        let control = lock(&self.control);
        if control.session != session {
            return None;
        }

        let attempts = self.state.borrow().reconnect_attempts;
        let max_attempts = self.config.reconnect.max_attempts;
        if attempts >= max_attempts {
            self.state
                .send_modify(|state| state.retries_exhausted = true);
            warn!(
                attempts = attempts,
                "Reconnect budget exhausted, staying disconnected until connect() is called"
            );
            return None;
        }

        let attempt = attempts + 1;
        self.state
            .send_modify(|state| state.reconnect_attempts = attempt);
        let delay = self.config.reconnect.delay_for(attempt);
        info!(
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = saturating_millis(delay),
            "Scheduling realtime reconnect"
        );
        Some(delay)
    }
}

/// Puts a session still in `Connecting` back to `Disconnected` when the
/// `connect()` future is dropped before its handshake finished.
struct HandshakeGuard<'a> {
    inner: &'a ChannelInner,
    session: u64,
    armed: bool,
}

impl HandshakeGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for HandshakeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let control = lock(&self.inner.control);
        if control.session != self.session {
            return;
        }
        let rolled_back = self.inner.state.send_if_modified(|state| {
            if state.status != ConnectionStatus::Connecting {
                return false;
            }
            state.status = ConnectionStatus::Disconnected;
            true
        });
        if rolled_back {
            debug!(session = self.session, "Connect cancelled during handshake");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
