//! REST client for the procurement read endpoints.

use agrilink_core::{
    CostAnalysis, DemandSupplyReconciliation, HarvestHorizon, HarvestReadiness, RiskAlerts,
};
use agrilink_realtime::CredentialStore;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ClientConfig;

pub const RECONCILIATION_PATH: &str = "/api/v1/procurement/demand-supply-reconciliation";
pub const RISK_ALERTS_PATH: &str = "/api/v1/procurement/risk-alerts";
pub const COST_ANALYSIS_PATH: &str = "/api/v1/procurement/cost-analysis";
pub const HARVEST_READINESS_PATH: &str = "/api/v1/procurement/harvest-readiness";

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

/// Read side of the procurement backend.
#[async_trait]
pub trait ProcurementApi: Send + Sync {
    async fn demand_supply_reconciliation(
        &self,
    ) -> Result<DemandSupplyReconciliation, ApiClientError>;

    async fn risk_alerts(&self) -> Result<RiskAlerts, ApiClientError>;

    async fn cost_analysis(&self) -> Result<CostAnalysis, ApiClientError>;

    async fn harvest_readiness(
        &self,
        horizon: HarvestHorizon,
    ) -> Result<HarvestReadiness, ApiClientError>;
}

/// Error body the backend sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl RestClient {
    pub fn new(
        config: &ClientConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T, Q>(&self, path: &str, query: Option<&Q>) -> Result<T, ApiClientError>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(url);
        if let Some(token) = self.credentials.bearer_token() {
            request = request.header(AUTHORIZATION, bearer_header(&token)?);
        }
        if let Some(query) = query {
            request = request.query(query);
        }
        debug!(path = path, "GET");
        let response = request.send().await?;
        parse_response(response).await
    }
}

#[async_trait]
impl ProcurementApi for RestClient {
    async fn demand_supply_reconciliation(
        &self,
    ) -> Result<DemandSupplyReconciliation, ApiClientError> {
        self.get_json::<_, ()>(RECONCILIATION_PATH, None).await
    }

    async fn risk_alerts(&self) -> Result<RiskAlerts, ApiClientError> {
        self.get_json::<_, ()>(RISK_ALERTS_PATH, None).await
    }

    async fn cost_analysis(&self) -> Result<CostAnalysis, ApiClientError> {
        self.get_json::<_, ()>(COST_ANALYSIS_PATH, None).await
    }

    async fn harvest_readiness(
        &self,
        horizon: HarvestHorizon,
    ) -> Result<HarvestReadiness, ApiClientError> {
        let query = [("days", horizon.days())];
        self.get_json(HARVEST_READINESS_PATH, Some(&query)).await
    }
}

fn bearer_header(token: &str) -> Result<HeaderValue, ApiClientError> {
    HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiClientError::Config(e.to_string()))
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiClientError> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        return Ok(serde_json::from_str::<T>(&text)?);
    }
    Err(ApiClientError::InvalidResponse(describe_failure(
        status.as_u16(),
        &text,
    )))
}

fn describe_failure(status: u16, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            code: Some(code),
            message,
        }) => format!("{}: {}", code, message),
        Ok(ErrorBody {
            code: None,
            message,
        }) => format!("HTTP {}: {}", status, message),
        Err(_) => format!("HTTP {}: {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_prefers_error_body() {
        assert_eq!(
            describe_failure(503, r#"{"code":"UPSTREAM_DOWN","message":"ledger offline"}"#),
            "UPSTREAM_DOWN: ledger offline"
        );
        assert_eq!(
            describe_failure(404, r#"{"message":"no such report"}"#),
            "HTTP 404: no such report"
        );
        assert_eq!(describe_failure(500, "boom"), "HTTP 500: boom");
    }

    #[test]
    fn test_bearer_header_rejects_control_characters() {
        assert!(bearer_header("abc").is_ok());
        assert!(matches!(
            bearer_header("bad\ntoken"),
            Err(ApiClientError::Config(_))
        ));
    }
}
