//! Response bodies of the procurement read endpoints.
//!
//! Only the fields the client acts on are typed. Unknown fields are ignored
//! on decode.

use serde::{Deserialize, Serialize};

use crate::event::RecordId;
use crate::Timestamp;

/// One crop line of the demand/supply reconciliation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationLine {
    pub crop: String,
    #[serde(default)]
    pub demand_quantity: f64,
    #[serde(default)]
    pub supply_quantity: f64,
}

impl ReconciliationLine {
    /// Positive when demand outstrips contracted supply.
    pub fn shortfall(&self) -> f64 {
        self.demand_quantity - self.supply_quantity
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DemandSupplyReconciliation {
    #[serde(default)]
    pub generated_at: Option<Timestamp>,
    #[serde(default)]
    pub lines: Vec<ReconciliationLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub id: RecordId,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub farmer_id: Option<RecordId>,
    #[serde(default)]
    pub raised_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RiskAlerts {
    #[serde(default)]
    pub alerts: Vec<RiskAlert>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropCost {
    pub crop: String,
    #[serde(default)]
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CostAnalysis {
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub average_cost_per_unit: f64,
    #[serde(default)]
    pub by_crop: Vec<CropCost>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReadinessEntry {
    pub farmer_id: RecordId,
    #[serde(default)]
    pub crop: String,
    #[serde(default)]
    pub expected_date: Option<chrono::NaiveDate>,
    #[serde(default)]
    pub readiness_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HarvestReadiness {
    pub days: u32,
    #[serde(default)]
    pub entries: Vec<HarvestReadinessEntry>,
}
