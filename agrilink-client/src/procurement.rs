//! Cached procurement reads kept fresh by realtime events.
//!
//! | event | dropped keys |
//! |---|---|
//! | `order_created`, `order_updated` | `demand-supply-reconciliation` |
//! | `risk_alert` | `risk-alerts` |
//! | `weather_update` | `harvest-readiness-{7,14,30}` |
//! | `farmer_updated`, `crop_progress_updated` | everything |

use agrilink_cache::{CacheError, CacheRead, Invalidation, ResponseCache};
use agrilink_core::{
    CacheKey, CostAnalysis, DemandSupplyReconciliation, EventKind, HarvestHorizon,
    HarvestReadiness, RealtimeEvent, RiskAlerts,
};
use agrilink_realtime::{RealtimeChannel, Subscription};
use std::sync::Arc;
use tracing::{debug, info};

use crate::api_client::ProcurementApi;

/// Event kinds that make cached responses stale.
pub const INVALIDATING_EVENTS: [EventKind; 6] = [
    EventKind::OrderCreated,
    EventKind::OrderUpdated,
    EventKind::RiskAlert,
    EventKind::WeatherUpdate,
    EventKind::FarmerUpdated,
    EventKind::CropProgressUpdated,
];

/// Which cached responses `event` makes stale, if any. Decided by the
/// event's kind alone, so an event whose payload did not decode still
/// invalidates.
pub fn invalidation_for(event: &RealtimeEvent) -> Option<Invalidation<CacheKey>> {
    match event.kind() {
        EventKind::OrderCreated | EventKind::OrderUpdated => {
            Some(Invalidation::Keys(vec![CacheKey::DemandSupplyReconciliation]))
        }
        EventKind::RiskAlert => Some(Invalidation::Keys(vec![CacheKey::RiskAlerts])),
        EventKind::WeatherUpdate => Some(Invalidation::Keys(
            CacheKey::harvest_readiness_keys().to_vec(),
        )),
        EventKind::FarmerUpdated | EventKind::CropProgressUpdated => Some(Invalidation::All),
        _ => None,
    }
}

#[derive(Clone)]
pub struct ProcurementService {
    api: Arc<dyn ProcurementApi>,
    cache: ResponseCache<CacheKey>,
}

impl ProcurementService {
    pub fn new(api: Arc<dyn ProcurementApi>, cache: ResponseCache<CacheKey>) -> Self {
        Self { api, cache }
    }

    pub fn cache(&self) -> &ResponseCache<CacheKey> {
        &self.cache
    }

    pub async fn demand_supply_reconciliation(
        &self,
        force_refresh: bool,
    ) -> Result<CacheRead<DemandSupplyReconciliation>, CacheError> {
        let api = Arc::clone(&self.api);
        self.cache
            .read(
                CacheKey::DemandSupplyReconciliation,
                move || async move { api.demand_supply_reconciliation().await },
                force_refresh,
            )
            .await
    }

    pub async fn risk_alerts(
        &self,
        force_refresh: bool,
    ) -> Result<CacheRead<RiskAlerts>, CacheError> {
        let api = Arc::clone(&self.api);
        self.cache
            .read(
                CacheKey::RiskAlerts,
                move || async move { api.risk_alerts().await },
                force_refresh,
            )
            .await
    }

    pub async fn cost_analysis(
        &self,
        force_refresh: bool,
    ) -> Result<CacheRead<CostAnalysis>, CacheError> {
        let api = Arc::clone(&self.api);
        self.cache
            .read(
                CacheKey::CostAnalysis,
                move || async move { api.cost_analysis().await },
                force_refresh,
            )
            .await
    }

    pub async fn harvest_readiness(
        &self,
        horizon: HarvestHorizon,
        force_refresh: bool,
    ) -> Result<CacheRead<HarvestReadiness>, CacheError> {
        let api = Arc::clone(&self.api);
        self.cache
            .read(
                CacheKey::HarvestReadiness(horizon),
                move || async move { api.harvest_readiness(horizon).await },
                force_refresh,
            )
            .await
    }

    /// Load every report into the cache. Returns the keys that failed.
    pub async fn warm(&self) -> Vec<(CacheKey, CacheError)> {
        let mut failures = Vec::new();
        for key in CacheKey::ALL {
            let outcome = match key {
                CacheKey::DemandSupplyReconciliation => {
                    self.demand_supply_reconciliation(false).await.map(drop)
                }
                CacheKey::RiskAlerts => self.risk_alerts(false).await.map(drop),
                CacheKey::CostAnalysis => self.cost_analysis(false).await.map(drop),
                CacheKey::HarvestReadiness(horizon) => {
                    self.harvest_readiness(horizon, false).await.map(drop)
                }
            };
            if let Err(err) = outcome {
                failures.push((key, err));
            }
        }
        debug!(failed = failures.len(), "Cache warm-up finished");
        failures
    }

    /// Drop whatever `event` made stale. Returns what was applied.
    pub fn apply_event(&self, event: &RealtimeEvent) -> Option<Invalidation<CacheKey>> {
        let invalidation = invalidation_for(event)?;
        let removed = self.cache.apply(&invalidation);
        match &invalidation {
            Invalidation::All => {
                info!(event = %event.kind(), removed = removed, "Cleared response cache")
            }
            Invalidation::Keys(keys) => info!(
                event = %event.kind(),
                keys = ?keys.iter().map(CacheKey::as_string).collect::<Vec<_>>(),
                removed = removed,
                "Invalidated cached responses"
            ),
        }
        Some(invalidation)
    }

    /// Subscribe to every invalidating event on `channel`.
    pub fn attach(&self, channel: &RealtimeChannel) -> Vec<Subscription> {
        INVALIDATING_EVENTS
            .iter()
            .cloned()
            .map(|kind| {
                let service = self.clone();
                channel.on(kind, move |event| {
                    service.apply_event(event);
                })
            })
            .collect()
    }
}
