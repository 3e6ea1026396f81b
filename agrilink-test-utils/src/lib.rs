//! AGRILINK Test Utilities
//!
//! Shared test infrastructure for the AGRILINK workspace:
//! - Fixtures for wire frames, reports and client config
//! - A mock procurement backend that counts its calls
//! - Proptest generators for keys, event kinds and frames
//! - Assertions for cache reads and connection state

pub use agrilink_core::{
    CacheKey, CostAnalysis, DemandSupplyReconciliation, EventKind, HarvestHorizon,
    HarvestReadiness, InboundFrame, RealtimeEvent, RecordId, RiskAlerts,
};

use agrilink_client::api_client::{ApiClientError, ProcurementApi};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// In-memory procurement backend.
///
/// Every response embeds the call number for its key, so a test can tell a
/// cached response (same number) from a fresh fetch (next number).
#[derive(Debug, Default)]
pub struct MockProcurementApi {
    calls: Mutex<HashMap<CacheKey, usize>>,
    failing: Mutex<HashSet<CacheKey>>,
}

impl MockProcurementApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls made so far for `key`.
    pub fn calls(&self, key: CacheKey) -> usize {
        lock(&self.calls).get(&key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        lock(&self.calls).values().sum()
    }

    /// Make reads of `key` fail (or succeed again).
    pub fn set_failing(&self, key: CacheKey, failing: bool) {
        let mut set = lock(&self.failing);
        if failing {
            set.insert(key);
        } else {
            set.remove(&key);
        }
    }

    fn record(&self, key: CacheKey) -> Result<usize, ApiClientError> {
        let call = {
            let mut calls = lock(&self.calls);
            let count = calls.entry(key).or_insert(0);
            *count += 1;
            *count
        };
        if lock(&self.failing).contains(&key) {
            return Err(ApiClientError::InvalidResponse(format!(
                "HTTP 503: {} unavailable",
                key
            )));
        }
        Ok(call)
    }
}

#[async_trait]
impl ProcurementApi for MockProcurementApi {
    async fn demand_supply_reconciliation(
        &self,
    ) -> Result<DemandSupplyReconciliation, ApiClientError> {
        let call = self.record(CacheKey::DemandSupplyReconciliation)?;
        Ok(fixtures::reconciliation(call as f64))
    }

    async fn risk_alerts(&self) -> Result<RiskAlerts, ApiClientError> {
        let call = self.record(CacheKey::RiskAlerts)?;
        Ok(fixtures::risk_alerts(call as i64))
    }

    async fn cost_analysis(&self) -> Result<CostAnalysis, ApiClientError> {
        let call = self.record(CacheKey::CostAnalysis)?;
        Ok(fixtures::cost_analysis(call as f64))
    }

    async fn harvest_readiness(
        &self,
        horizon: HarvestHorizon,
    ) -> Result<HarvestReadiness, ApiClientError> {
        let call = self.record(CacheKey::HarvestReadiness(horizon))?;
        Ok(fixtures::harvest_readiness(horizon, call as f64))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for realtime and cache types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        prop_oneof![
            (1i64..1_000_000).prop_map(RecordId::Int),
            "[A-Z]-[0-9]{1,5}".prop_map(RecordId::Text),
        ]
    }

    pub fn arb_horizon() -> impl Strategy<Value = HarvestHorizon> {
        prop::sample::select(HarvestHorizon::ALL.to_vec())
    }

    pub fn arb_cache_key() -> impl Strategy<Value = CacheKey> {
        prop::sample::select(CacheKey::ALL.to_vec())
    }

    /// Kinds the backend may push, including ones this client does not know.
    pub fn arb_event_kind() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::OrderCreated),
            Just(EventKind::OrderUpdated),
            Just(EventKind::RiskAlert),
            Just(EventKind::HarvestReady),
            Just(EventKind::Notification),
            Just(EventKind::FarmerUpdated),
            Just(EventKind::CropProgressUpdated),
            Just(EventKind::WeatherUpdate),
            "[a-z]{3,8}_[a-z]{3,8}_v[0-9]".prop_map(EventKind::Other),
        ]
    }

    /// A well-formed frame whose payload decodes for its kind.
    pub fn arb_inbound_frame() -> impl Strategy<Value = InboundFrame> {
        (
            arb_event_kind(),
            arb_record_id(),
            proptest::option::of("[a-f0-9]{8}"),
        )
            .prop_map(|(kind, id, connection_id)| {
                let payload = match &kind {
                    EventKind::OrderCreated | EventKind::OrderUpdated => {
                        json!({ "id": id, "quantity": 12 })
                    }
                    EventKind::FarmerUpdated => json!({ "id": id }),
                    EventKind::Notification => json!({ "message": "Contract signed" }),
                    EventKind::RiskAlert => json!({ "id": id, "severity": "high" }),
                    _ => json!({ "farmer_id": id }),
                };
                InboundFrame {
                    event: kind.as_str().to_string(),
                    payload,
                    connection_id,
                }
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built frames, reports and config.

    use super::*;
    use agrilink_cache::CacheConfig;
    use agrilink_client::config::{ClientConfig, LogFormat};
    use agrilink_core::{CropCost, HarvestReadinessEntry, ReconciliationLine, RiskAlert};
    use agrilink_realtime::ReconnectConfig;
    use serde_json::{json, Value as JsonValue};

    pub fn frame(event: &str, payload: JsonValue, connection_id: Option<&str>) -> InboundFrame {
        InboundFrame {
            event: event.to_string(),
            payload,
            connection_id: connection_id.map(str::to_string),
        }
    }

    /// `order_created {id, quantity}` as the backend pushes it.
    pub fn order_created(id: i64, quantity: f64, connection_id: Option<&str>) -> InboundFrame {
        frame(
            "order_created",
            json!({ "id": id, "quantity": quantity }),
            connection_id,
        )
    }

    pub fn weather_update(region: &str) -> InboundFrame {
        frame(
            "weather_update",
            json!({ "region": region, "summary": "Heavy rain expected" }),
            None,
        )
    }

    pub fn risk_alert(severity: &str, message: &str) -> InboundFrame {
        frame(
            "risk_alert",
            json!({ "id": 1, "severity": severity, "message": message }),
            None,
        )
    }

    pub fn reconciliation(demand: f64) -> DemandSupplyReconciliation {
        DemandSupplyReconciliation {
            generated_at: Some(chrono::Utc::now()),
            lines: vec![ReconciliationLine {
                crop: "maize".to_string(),
                demand_quantity: demand,
                supply_quantity: 0.0,
            }],
        }
    }

    pub fn risk_alerts(id: i64) -> RiskAlerts {
        RiskAlerts {
            alerts: vec![RiskAlert {
                id: RecordId::Int(id),
                severity: "medium".to_string(),
                message: "Late planting".to_string(),
                farmer_id: None,
                raised_at: None,
            }],
        }
    }

    pub fn cost_analysis(total: f64) -> CostAnalysis {
        CostAnalysis {
            currency: "KES".to_string(),
            total_cost: total,
            average_cost_per_unit: 0.0,
            by_crop: vec![CropCost {
                crop: "maize".to_string(),
                cost: total,
            }],
        }
    }

    pub fn harvest_readiness(horizon: HarvestHorizon, readiness_pct: f64) -> HarvestReadiness {
        HarvestReadiness {
            days: horizon.days(),
            entries: vec![HarvestReadinessEntry {
                farmer_id: RecordId::Int(1),
                crop: "sorghum".to_string(),
                expected_date: None,
                readiness_pct,
            }],
        }
    }

    pub fn client_config(ws_endpoint: &str) -> ClientConfig {
        ClientConfig {
            api_base_url: "http://api.agrilink.test".to_string(),
            ws_endpoint: ws_endpoint.to_string(),
            request_timeout_ms: 10_000,
            handshake_timeout_ms: 10_000,
            credentials_path: None,
            log_format: LogFormat::Pretty,
            reconnect: ReconnectConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache reads and channel state.

    use agrilink_cache::CacheRead;
    use agrilink_realtime::{ConnectionStatus, RealtimeChannel};

    #[track_caller]
    pub fn assert_cache_hit<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_hit(), "Expected cache hit, got miss: {:?}", read);
    }

    #[track_caller]
    pub fn assert_cache_miss<T: std::fmt::Debug>(read: &CacheRead<T>) {
        assert!(read.was_cache_miss(), "Expected cache miss, got hit: {:?}", read);
    }

    #[track_caller]
    pub fn assert_status(channel: &RealtimeChannel, expected: ConnectionStatus) {
        let state = channel.state();
        assert_eq!(
            state.status, expected,
            "Connection status mismatch: expected {:?}, got {:?}",
            expected, state
        );
    }
}
