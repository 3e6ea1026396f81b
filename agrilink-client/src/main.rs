//! `agrilink-watch`: keeps the procurement reports cached and logs live
//! updates until Ctrl+C.

use agrilink_client::api_client::RestClient;
use agrilink_client::config::ClientConfig;
use agrilink_client::error::ClientError;
use agrilink_client::telemetry::init_tracing;
use agrilink_client::App;
use agrilink_realtime::{CredentialStore, FileCredentialStore, StaticCredentials, WsConnector};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let config = ClientConfig::load()?;
    init_tracing(config.log_format)?;

    let credentials: Arc<dyn CredentialStore> = match &config.credentials_path {
        Some(path) => Arc::new(FileCredentialStore::new(path)),
        None => Arc::new(StaticCredentials::anonymous()),
    };
    let api = RestClient::new(&config, Arc::clone(&credentials))?;
    info!(
        api = api.base_url(),
        ws = %config.ws_endpoint,
        "Starting agrilink-watch"
    );

    let app = App::new(&config, Arc::new(api), Arc::new(WsConnector), credentials);
    let failures = app.start().await;
    if !failures.is_empty() {
        warn!(failed = failures.len(), "Some reports could not be loaded");
    }

    app.run(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    })
    .await
}
