//! Realtime Event Types
//!
//! Every frame pushed by the backend is decoded into a [`RealtimeEvent`].
//! Known event names carry typed payloads; anything else is kept verbatim
//! in [`RealtimeEvent::Unknown`] so newer backends do not break older
//! clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

use crate::error::{CoreResult, FrameError};
use crate::frame::{CloseInfo, InboundFrame};

/// Identifier of a backend record. The backend mixes numeric and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(id) => write!(f, "{}", id),
            RecordId::Text(id) => f.write_str(id),
        }
    }
}

/// Name of an event, used as the subscription topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    Error,
    OrderCreated,
    OrderUpdated,
    RiskAlert,
    HarvestReady,
    Notification,
    FarmerUpdated,
    CropProgressUpdated,
    WeatherUpdate,
    /// Any event name this client does not know about.
    Other(String),
}

impl EventKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "connect" => EventKind::Connect,
            "disconnect" => EventKind::Disconnect,
            "error" => EventKind::Error,
            "order_created" => EventKind::OrderCreated,
            "order_updated" => EventKind::OrderUpdated,
            "risk_alert" => EventKind::RiskAlert,
            "harvest_ready" => EventKind::HarvestReady,
            "notification" => EventKind::Notification,
            "farmer_updated" => EventKind::FarmerUpdated,
            "crop_progress_updated" => EventKind::CropProgressUpdated,
            "weather_update" => EventKind::WeatherUpdate,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::Error => "error",
            EventKind::OrderCreated => "order_created",
            EventKind::OrderUpdated => "order_updated",
            EventKind::RiskAlert => "risk_alert",
            EventKind::HarvestReady => "harvest_ready",
            EventKind::Notification => "notification",
            EventKind::FarmerUpdated => "farmer_updated",
            EventKind::CropProgressUpdated => "crop_progress_updated",
            EventKind::WeatherUpdate => "weather_update",
            EventKind::Other(name) => name,
        }
    }

    /// Lifecycle events are produced by the channel itself, never by the wire.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventKind::Connect | EventKind::Disconnect | EventKind::Error
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EventKind {
    fn from(name: &str) -> Self {
        EventKind::from_name(name)
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// A procurement order was created or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregator_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlertEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<RecordId>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestReadyEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

/// Free-form message meant for a toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerEvent {
    pub id: RecordId,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropProgressEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

// ============================================================================
// EVENT
// ============================================================================

/// An event delivered to channel subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    // ========================================================================
    // LIFECYCLE (raised by the channel)
    // ========================================================================
    /// The socket opened.
    Connect,
    /// The socket closed.
    Disconnect(CloseInfo),
    /// A socket level error occurred.
    Error { message: String },

    // ========================================================================
    // DOMAIN (pushed by the backend)
    // ========================================================================
    OrderCreated(OrderEvent),
    OrderUpdated(OrderEvent),
    RiskAlert(RiskAlertEvent),
    HarvestReady(HarvestReadyEvent),
    Notification(NotificationEvent),
    FarmerUpdated(FarmerEvent),
    CropProgressUpdated(CropProgressEvent),
    WeatherUpdate(WeatherEvent),

    /// A known event whose payload did not fit its typed shape, kept
    /// verbatim and delivered under its own kind.
    Untyped {
        kind: EventKind,
        payload: JsonValue,
        reason: String,
    },

    /// An event name this client does not understand, kept verbatim.
    Unknown { event: String, payload: JsonValue },
}

impl RealtimeEvent {
    /// Decode an inbound frame.
    ///
    /// Lifecycle names arriving over the wire are not trusted as lifecycle
    /// events and decode as [`RealtimeEvent::Unknown`]. A known name whose
    /// payload does not fit its typed shape decodes as
    /// [`RealtimeEvent::Untyped`] and is still delivered under that name.
    pub fn from_frame(frame: &InboundFrame) -> Self {
        let event = frame.event.as_str();
        let payload = &frame.payload;
        let kind = EventKind::from_name(event);
        let decoded = match &kind {
            EventKind::OrderCreated => decode(event, payload).map(RealtimeEvent::OrderCreated),
            EventKind::OrderUpdated => decode(event, payload).map(RealtimeEvent::OrderUpdated),
            EventKind::RiskAlert => decode(event, payload).map(RealtimeEvent::RiskAlert),
            EventKind::HarvestReady => decode(event, payload).map(RealtimeEvent::HarvestReady),
            EventKind::Notification => decode(event, payload).map(RealtimeEvent::Notification),
            EventKind::FarmerUpdated => decode(event, payload).map(RealtimeEvent::FarmerUpdated),
            EventKind::CropProgressUpdated => {
                decode(event, payload).map(RealtimeEvent::CropProgressUpdated)
            }
            EventKind::WeatherUpdate => decode(event, payload).map(RealtimeEvent::WeatherUpdate),
            EventKind::Connect | EventKind::Disconnect | EventKind::Error | EventKind::Other(_) => {
                return RealtimeEvent::Unknown {
                    event: event.to_string(),
                    payload: payload.clone(),
                };
            }
        };
        decoded.unwrap_or_else(|err| RealtimeEvent::Untyped {
            kind,
            payload: payload.clone(),
            reason: err.to_string(),
        })
    }

    /// The topic this event is delivered on.
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::Connect => EventKind::Connect,
            RealtimeEvent::Disconnect(_) => EventKind::Disconnect,
            RealtimeEvent::Error { .. } => EventKind::Error,
            RealtimeEvent::OrderCreated(_) => EventKind::OrderCreated,
            RealtimeEvent::OrderUpdated(_) => EventKind::OrderUpdated,
            RealtimeEvent::RiskAlert(_) => EventKind::RiskAlert,
            RealtimeEvent::HarvestReady(_) => EventKind::HarvestReady,
            RealtimeEvent::Notification(_) => EventKind::Notification,
            RealtimeEvent::FarmerUpdated(_) => EventKind::FarmerUpdated,
            RealtimeEvent::CropProgressUpdated(_) => EventKind::CropProgressUpdated,
            RealtimeEvent::WeatherUpdate(_) => EventKind::WeatherUpdate,
            RealtimeEvent::Untyped { kind, .. } => kind.clone(),
            RealtimeEvent::Unknown { event, .. } => EventKind::Other(event.clone()),
        }
    }

    /// The wire name of the event.
    pub fn name(&self) -> String {
        self.kind().as_str().to_string()
    }

    /// The payload as JSON, as a wildcard subscriber would see it.
    pub fn payload(&self) -> JsonValue {
        let encoded = match self {
            RealtimeEvent::Connect => Ok(JsonValue::Null),
            RealtimeEvent::Disconnect(close) => serde_json::to_value(close),
            RealtimeEvent::Error { message } => Ok(JsonValue::String(message.clone())),
            RealtimeEvent::OrderCreated(p) | RealtimeEvent::OrderUpdated(p) => {
                serde_json::to_value(p)
            }
            RealtimeEvent::RiskAlert(p) => serde_json::to_value(p),
            RealtimeEvent::HarvestReady(p) => serde_json::to_value(p),
            RealtimeEvent::Notification(p) => serde_json::to_value(p),
            RealtimeEvent::FarmerUpdated(p) => serde_json::to_value(p),
            RealtimeEvent::CropProgressUpdated(p) => serde_json::to_value(p),
            RealtimeEvent::WeatherUpdate(p) => serde_json::to_value(p),
            RealtimeEvent::Untyped { payload, .. } | RealtimeEvent::Unknown { payload, .. } => {
                Ok(payload.clone())
            }
        };
        encoded.unwrap_or(JsonValue::Null)
    }
}

fn decode<T: DeserializeOwned>(event: &str, payload: &JsonValue) -> CoreResult<T> {
    serde_json::from_value(payload.clone()).map_err(|e| FrameError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}
