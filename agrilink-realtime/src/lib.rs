//! AGRILINK realtime channel.
//!
//! One persistent push connection to the backend, reconnected with bounded
//! exponential backoff, whose frames are decoded into typed
//! [`RealtimeEvent`](agrilink_core::RealtimeEvent)s and fanned out to
//! subscribers.
//!
//! ```ignore
//! let channel = RealtimeChannel::new(config, Arc::new(WsConnector), credentials);
//! let sub = channel.on(EventKind::OrderCreated, |event| println!("{:?}", event));
//! channel.connect().await?;
//! ```

pub mod backoff;
pub mod channel;
pub mod config;
pub mod credentials;
pub mod error;
pub mod registry;
pub mod state;
pub mod transport;

pub use channel::RealtimeChannel;
pub use config::{ChannelConfig, ReconnectConfig};
pub use credentials::{endpoint_url, CredentialStore, FileCredentialStore, StaticCredentials};
pub use error::ChannelError;
pub use registry::{Callback, DispatchReport, SubscriberRegistry, Subscription, Topic};
pub use state::{ConnectionState, ConnectionStatus};
pub use transport::memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use transport::tungstenite::WsConnector;
pub use transport::{Connection, Connector, Frame, FrameSink, FrameStream};
