//! AGRILINK procurement client.
//!
//! Cached REST reads of the procurement reports, invalidated by the events
//! the realtime channel pushes, plus the notifications users see.

pub mod api_client;
pub mod app;
pub mod config;
pub mod error;
pub mod notifications;
pub mod procurement;
pub mod telemetry;

pub use api_client::{ApiClientError, ProcurementApi, RestClient};
pub use app::App;
pub use config::{ClientConfig, ConfigError, LogFormat};
pub use error::ClientError;
pub use notifications::{Notification, NotificationAction, NotificationLevel};
pub use procurement::{invalidation_for, ProcurementService};
