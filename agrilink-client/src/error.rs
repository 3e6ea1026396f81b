//! Error types for the client.

use agrilink_cache::CacheError;
use agrilink_realtime::ChannelError;

use crate::api_client::ApiClientError;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Api(#[from] ApiClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("Failed to initialise logging: {0}")]
    Telemetry(String),
    #[error("Realtime channel gave up reconnecting")]
    RetriesExhausted,
}
