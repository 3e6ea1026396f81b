//! AGRILINK Core - Realtime Vocabulary
//!
//! Pure data types shared by the realtime channel, the response cache and
//! the procurement client. No I/O and no runtime lives here.

pub mod cache_key;
pub mod error;
pub mod event;
pub mod frame;
pub mod types;

pub use cache_key::{CacheKey, HarvestHorizon};
pub use error::{CoreResult, FrameError};
pub use event::{
    CropProgressEvent, EventKind, FarmerEvent, HarvestReadyEvent, NotificationEvent, OrderEvent,
    RealtimeEvent, RecordId, RiskAlertEvent, WeatherEvent,
};
pub use frame::{CloseInfo, InboundFrame, OutboundFrame, ABNORMAL_CLOSURE, NORMAL_CLOSURE};
pub use types::{
    CostAnalysis, CropCost, DemandSupplyReconciliation, HarvestReadiness, HarvestReadinessEntry,
    ReconciliationLine, RiskAlert, RiskAlerts,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
