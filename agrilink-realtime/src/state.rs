//! Observable connection state.

use agrilink_core::CloseInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot of the channel's connection lifecycle.
///
/// Published through a `watch` channel so callers can tell "reconnecting"
/// apart from "gave up" and offer a manual reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// Reconnect attempts made since the last successful connection.
    pub reconnect_attempts: u32,
    /// First connection id announced by the backend on this connection.
    pub connection_id: Option<String>,
    /// Set once the reconnect budget is spent. Cleared by `connect()`.
    pub retries_exhausted: bool,
    pub last_close: Option<CloseInfo>,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn is_reconnecting(&self) -> bool {
        self.status != ConnectionStatus::Connected
            && self.reconnect_attempts > 0
            && !self.retries_exhausted
    }
}
