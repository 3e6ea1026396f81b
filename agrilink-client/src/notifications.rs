//! User-facing notifications raised by realtime events and by changes in
//! the connection state.

use agrilink_core::{EventKind, RealtimeEvent};
use agrilink_realtime::{ConnectionState, RealtimeChannel, Subscription};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationLevel {
    /// Level named by the backend. Unrecognised labels are `Info`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "warning" | "warn" => NotificationLevel::Warning,
            "error" | "critical" => NotificationLevel::Error,
            "success" => NotificationLevel::Success,
            _ => NotificationLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    Retry,
    Reconnect,
    Dismiss,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub level: NotificationLevel,
    pub title: Option<String>,
    pub message: String,
    pub action: Option<NotificationAction>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            level,
            title: None,
            message: message.into(),
            action: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_action(mut self, action: NotificationAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Notification for a pushed event, if the event is one users see.
    pub fn from_event(event: &RealtimeEvent) -> Option<Self> {
        match event {
            RealtimeEvent::Notification(note) => {
                let level = note
                    .level
                    .as_deref()
                    .map_or(NotificationLevel::Info, NotificationLevel::from_label);
                let message = match (note.message.trim(), note.title.as_deref()) {
                    ("", None) => return None,
                    ("", Some(title)) => title.to_string(),
                    (message, _) => message.to_string(),
                };
                let notification = Notification::new(level, message);
                Some(match &note.title {
                    Some(title) => notification.with_title(title.clone()),
                    None => notification,
                })
            }
            RealtimeEvent::RiskAlert(alert) => {
                let severe = alert
                    .severity
                    .as_deref()
                    .map(|s| matches!(s.to_ascii_lowercase().as_str(), "high" | "critical"))
                    .unwrap_or(false);
                let level = if severe {
                    NotificationLevel::Error
                } else {
                    NotificationLevel::Warning
                };
                let message = match (&alert.message, &alert.farmer_id) {
                    (Some(message), _) => message.clone(),
                    (None, Some(farmer)) => format!("New risk alert for farmer {}", farmer),
                    (None, None) => "New risk alert".to_string(),
                };
                Some(
                    Notification::new(level, message)
                        .with_title("Risk alert")
                        .with_action(NotificationAction::Dismiss),
                )
            }
            RealtimeEvent::HarvestReady(harvest) => {
                let mut message = match &harvest.crop {
                    Some(crop) => format!("{} ready for harvest", crop),
                    None => "Crop ready for harvest".to_string(),
                };
                if let Some(farmer) = &harvest.farmer_id {
                    message.push_str(&format!(" (farmer {})", farmer));
                }
                if let Some(date) = &harvest.expected_date {
                    message.push_str(&format!(" on {}", date));
                }
                Some(Notification::new(NotificationLevel::Success, message).with_title("Harvest"))
            }
            _ => None,
        }
    }

    /// Notification for a connection state transition, if it is worth one.
    pub fn from_state_change(prev: &ConnectionState, next: &ConnectionState) -> Option<Self> {
        if next.retries_exhausted && !prev.retries_exhausted {
            return Some(
                Notification::new(
                    NotificationLevel::Error,
                    "Live updates stopped. Reconnect to resume.",
                )
                .with_action(NotificationAction::Reconnect),
            );
        }
        if prev.is_connected() && !next.is_connected() {
            let lost = next.last_close.as_ref().is_some_and(|close| !close.is_normal());
            return lost.then(|| {
                Notification::new(
                    NotificationLevel::Warning,
                    "Connection lost. Reconnecting...",
                )
            });
        }
        let recovering = prev.last_close.as_ref().is_some_and(|close| !close.is_normal());
        if !prev.is_connected() && next.is_connected() && recovering {
            return Some(Notification::new(
                NotificationLevel::Success,
                "Live updates restored",
            ));
        }
        None
    }
}

/// Event kinds that produce a notification.
pub const NOTIFYING_EVENTS: [EventKind; 3] = [
    EventKind::Notification,
    EventKind::RiskAlert,
    EventKind::HarvestReady,
];

/// Forward notifying events from `channel` into `tx`.
pub fn forward_events(
    channel: &RealtimeChannel,
    tx: mpsc::UnboundedSender<Notification>,
) -> Vec<Subscription> {
    NOTIFYING_EVENTS
        .iter()
        .cloned()
        .map(|kind| {
            let tx = tx.clone();
            channel.on(kind, move |event| {
                if let Some(notification) = Notification::from_event(event) {
                    let _ = tx.send(notification);
                }
            })
        })
        .collect()
}

/// Watch the connection state and report transitions into `tx`. Stops when
/// the channel or the receiving side goes away.
pub fn spawn_state_notifier(
    mut state: watch::Receiver<ConnectionState>,
    tx: mpsc::UnboundedSender<Notification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut prev = state.borrow_and_update().clone();
        while state.changed().await.is_ok() {
            let next = state.borrow_and_update().clone();
            if let Some(notification) = Notification::from_state_change(&prev, &next) {
                if tx.send(notification).is_err() {
                    break;
                }
            }
            prev = next;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agrilink_core::{CloseInfo, HarvestReadyEvent, NotificationEvent, RecordId, RiskAlertEvent};
    use agrilink_realtime::ConnectionStatus;
    use serde_json::Map;

    fn risk(severity: Option<&str>, message: Option<&str>) -> RealtimeEvent {
        RealtimeEvent::RiskAlert(RiskAlertEvent {
            id: Some(RecordId::Int(3)),
            severity: severity.map(str::to_string),
            message: message.map(str::to_string),
            farmer_id: Some(RecordId::Text("F-9".to_string())),
            extra: Map::new(),
        })
    }

    fn connected() -> ConnectionState {
        ConnectionState {
            status: ConnectionStatus::Connected,
            ..ConnectionState::default()
        }
    }

    #[test]
    fn test_notification_event_uses_backend_level() {
        let event = RealtimeEvent::Notification(NotificationEvent {
            message: "Contract signed".to_string(),
            title: Some("Contracts".to_string()),
            level: Some("SUCCESS".to_string()),
            extra: Map::new(),
        });
        let notification = Notification::from_event(&event).expect("notification");
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(notification.message, "Contract signed");
        assert_eq!(notification.title.as_deref(), Some("Contracts"));
    }

    #[test]
    fn test_empty_notification_is_skipped() {
        let event = RealtimeEvent::Notification(NotificationEvent {
            message: "  ".to_string(),
            title: None,
            level: None,
            extra: Map::new(),
        });
        assert!(Notification::from_event(&event).is_none());
    }

    #[test]
    fn test_risk_alert_level_follows_severity() {
        let high = Notification::from_event(&risk(Some("High"), Some("Pest outbreak")))
            .expect("notification");
        assert_eq!(high.level, NotificationLevel::Error);
        assert_eq!(high.message, "Pest outbreak");
        assert_eq!(high.action, Some(NotificationAction::Dismiss));

        let low = Notification::from_event(&risk(Some("low"), None)).expect("notification");
        assert_eq!(low.level, NotificationLevel::Warning);
        assert_eq!(low.message, "New risk alert for farmer F-9");
    }

    #[test]
    fn test_harvest_ready_message() {
        let event = RealtimeEvent::HarvestReady(HarvestReadyEvent {
            farmer_id: Some(RecordId::Int(12)),
            crop: Some("Maize".to_string()),
            expected_date: Some("2026-11-02".to_string()),
            extra: Map::new(),
        });
        let notification = Notification::from_event(&event).expect("notification");
        assert_eq!(notification.level, NotificationLevel::Success);
        assert_eq!(
            notification.message,
            "Maize ready for harvest (farmer 12) on 2026-11-02"
        );
    }

    #[test]
    fn test_lifecycle_events_are_silent() {
        assert!(Notification::from_event(&RealtimeEvent::Connect).is_none());
        assert!(
            Notification::from_event(&RealtimeEvent::Disconnect(CloseInfo::normal())).is_none()
        );
    }

    #[test]
    fn test_state_changes() {
        let lost = ConnectionState {
            last_close: Some(CloseInfo::abnormal("connection lost")),
            ..ConnectionState::default()
        };
        let warning = Notification::from_state_change(&connected(), &lost).expect("lost");
        assert_eq!(warning.level, NotificationLevel::Warning);

        let restored = Notification::from_state_change(&lost, &connected()).expect("restored");
        assert_eq!(restored.level, NotificationLevel::Success);

        let exhausted = ConnectionState {
            reconnect_attempts: 5,
            retries_exhausted: true,
            ..lost.clone()
        };
        let error = Notification::from_state_change(&lost, &exhausted).expect("exhausted");
        assert_eq!(error.level, NotificationLevel::Error);
        assert_eq!(error.action, Some(NotificationAction::Reconnect));
    }

    #[test]
    fn test_user_disconnect_and_first_connect_are_silent() {
        assert!(
            Notification::from_state_change(&connected(), &ConnectionState::default()).is_none()
        );
        assert!(
            Notification::from_state_change(&ConnectionState::default(), &connected()).is_none()
        );
    }
}
