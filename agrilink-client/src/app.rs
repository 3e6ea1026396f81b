//! Composition root: one channel, one cache, one procurement service.

use agrilink_cache::{CacheError, ResponseCache};
use agrilink_core::CacheKey;
use agrilink_realtime::{Connector, CredentialStore, RealtimeChannel, Subscription};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::api_client::ProcurementApi;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::notifications::{
    forward_events, spawn_state_notifier, Notification, NotificationLevel,
};
use crate::procurement::ProcurementService;

pub struct App {
    channel: RealtimeChannel,
    service: ProcurementService,
    subscriptions: Vec<Subscription>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    notifier: JoinHandle<()>,
}

impl App {
    /// Wire everything together. Must be called inside a Tokio runtime.
    pub fn new(
        config: &ClientConfig,
        api: Arc<dyn ProcurementApi>,
        connector: Arc<dyn Connector>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let channel = RealtimeChannel::new(config.channel_config(), connector, credentials);
        let service = ProcurementService::new(api, ResponseCache::new(config.cache.clone()));

        let (tx, notifications) = mpsc::unbounded_channel();
        let mut subscriptions = service.attach(&channel);
        subscriptions.extend(forward_events(&channel, tx.clone()));
        let notifier = spawn_state_notifier(channel.watch_state(), tx);

        Self {
            channel,
            service,
            subscriptions,
            notifications,
            notifier,
        }
    }

    pub fn channel(&self) -> &RealtimeChannel {
        &self.channel
    }

    pub fn service(&self) -> &ProcurementService {
        &self.service
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Connect and warm the cache. A failed handshake is not fatal: the
    /// channel keeps retrying in the background. Returns the reports that
    /// could not be loaded.
    pub async fn start(&self) -> Vec<(CacheKey, CacheError)> {
        if let Err(err) = self.channel.connect().await {
            warn!(error = %err, "Initial realtime connection failed, retrying in background");
        }
        let failures = self.service.warm().await;
        for (key, err) in &failures {
            warn!(key = %key, error = %err, "Failed to load report");
        }
        failures
    }

    /// Next pending notification, without waiting.
    pub fn try_next_notification(&mut self) -> Option<Notification> {
        self.notifications.try_recv().ok()
    }

    pub async fn next_notification(&mut self) -> Option<Notification> {
        self.notifications.recv().await
    }

    /// Log notifications until `shutdown` resolves or the channel gives up
    /// reconnecting. Disconnects on the way out.
    pub async fn run<F>(mut self, shutdown: F) -> Result<(), ClientError>
    where
        F: Future<Output = ()>,
    {
        let mut state = self.channel.watch_state();
        tokio::pin!(shutdown);

        let outcome = loop {
            if state.borrow_and_update().retries_exhausted {
                break Err(ClientError::RetriesExhausted);
            }
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }
                Some(notification) = self.notifications.recv() => log_notification(&notification),
                changed = state.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        while let Ok(notification) = self.notifications.try_recv() {
            log_notification(&notification);
        }
        self.notifier.abort();
        self.channel.disconnect();
        outcome
    }
}

fn log_notification(notification: &Notification) {
    let title = notification.title.as_deref().unwrap_or("");
    match notification.level {
        NotificationLevel::Info | NotificationLevel::Success => {
            info!(title = title, action = ?notification.action, "{}", notification.message)
        }
        NotificationLevel::Warning => {
            warn!(title = title, action = ?notification.action, "{}", notification.message)
        }
        NotificationLevel::Error => {
            error!(title = title, action = ?notification.action, "{}", notification.message)
        }
    }
}
