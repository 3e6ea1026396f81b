//! Logical cache keys for procurement read endpoints.
//!
//! The key space is closed: every cacheable resource is a variant here, so
//! the response cache cannot grow beyond a handful of entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Look-ahead window of a harvest readiness report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HarvestHorizon {
    Week,
    Fortnight,
    Month,
}

impl HarvestHorizon {
    pub const ALL: [HarvestHorizon; 3] = [
        HarvestHorizon::Week,
        HarvestHorizon::Fortnight,
        HarvestHorizon::Month,
    ];

    pub fn days(self) -> u32 {
        match self {
            HarvestHorizon::Week => 7,
            HarvestHorizon::Fortnight => 14,
            HarvestHorizon::Month => 30,
        }
    }

    pub fn from_days(days: u32) -> Result<Self, FrameError> {
        match days {
            7 => Ok(HarvestHorizon::Week),
            14 => Ok(HarvestHorizon::Fortnight),
            30 => Ok(HarvestHorizon::Month),
            other => Err(FrameError::UnsupportedHorizon(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    DemandSupplyReconciliation,
    RiskAlerts,
    CostAnalysis,
    HarvestReadiness(HarvestHorizon),
}

impl CacheKey {
    /// Every key the procurement service may store.
    pub const ALL: [CacheKey; 6] = [
        CacheKey::DemandSupplyReconciliation,
        CacheKey::RiskAlerts,
        CacheKey::CostAnalysis,
        CacheKey::HarvestReadiness(HarvestHorizon::Week),
        CacheKey::HarvestReadiness(HarvestHorizon::Fortnight),
        CacheKey::HarvestReadiness(HarvestHorizon::Month),
    ];

    /// All harvest readiness variants.
    pub fn harvest_readiness_keys() -> [CacheKey; 3] {
        HarvestHorizon::ALL.map(CacheKey::HarvestReadiness)
    }

    pub fn as_string(&self) -> String {
        match self {
            CacheKey::DemandSupplyReconciliation => "demand-supply-reconciliation".to_string(),
            CacheKey::RiskAlerts => "risk-alerts".to_string(),
            CacheKey::CostAnalysis => "cost-analysis".to_string(),
            CacheKey::HarvestReadiness(horizon) => {
                format!("harvest-readiness-{}", horizon.days())
            }
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl FromStr for CacheKey {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demand-supply-reconciliation" => Ok(CacheKey::DemandSupplyReconciliation),
            "risk-alerts" => Ok(CacheKey::RiskAlerts),
            "cost-analysis" => Ok(CacheKey::CostAnalysis),
            other => {
                let days = other
                    .strip_prefix("harvest-readiness-")
                    .and_then(|d| d.parse::<u32>().ok())
                    .ok_or_else(|| FrameError::UnknownCacheKey(other.to_string()))?;
                HarvestHorizon::from_days(days)
                    .map(CacheKey::HarvestReadiness)
                    .map_err(|_| FrameError::UnknownCacheKey(other.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_key_strings() {
        assert_eq!(
            CacheKey::DemandSupplyReconciliation.to_string(),
            "demand-supply-reconciliation"
        );
        assert_eq!(CacheKey::RiskAlerts.to_string(), "risk-alerts");
        assert_eq!(CacheKey::CostAnalysis.to_string(), "cost-analysis");
        assert_eq!(
            CacheKey::HarvestReadiness(HarvestHorizon::Fortnight).to_string(),
            "harvest-readiness-14"
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!("harvest-readiness-9".parse::<CacheKey>().is_err());
        assert!("farmers".parse::<CacheKey>().is_err());
        assert!(HarvestHorizon::from_days(60).is_err());
    }

    #[test]
    fn test_harvest_readiness_keys() {
        let days: Vec<String> = CacheKey::harvest_readiness_keys()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(
            days,
            vec![
                "harvest-readiness-7",
                "harvest-readiness-14",
                "harvest-readiness-30"
            ]
        );
    }

    proptest! {
        #[test]
        fn every_known_key_parses_back(index in 0usize..CacheKey::ALL.len()) {
            let key = CacheKey::ALL[index];
            let parsed: CacheKey = key.to_string().parse().expect("known key");
            prop_assert_eq!(parsed, key);
        }
    }
}
