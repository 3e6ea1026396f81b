//! End-to-end: pushed events keep the cached reports fresh and surface as
//! notifications. Backend and push server are both in memory.

use agrilink_cache::CacheError;
use agrilink_cache::Invalidation;
use agrilink_client::{invalidation_for, App, ClientError, NotificationAction, NotificationLevel};
use agrilink_core::{CacheKey, EventKind, HarvestHorizon, RealtimeEvent, RecordId};
use agrilink_realtime::{
    ConnectionStatus, Frame, MemoryConnector, MemoryListener, StaticCredentials,
};
use agrilink_test_utils::assertions::{assert_cache_hit, assert_cache_miss, assert_status};
use agrilink_test_utils::generators::arb_inbound_frame;
use agrilink_test_utils::{fixtures, MockProcurementApi};
use proptest::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;

fn app_with(api: &Arc<MockProcurementApi>) -> (App, MemoryConnector, MemoryListener) {
    let (connector, listener) = MemoryConnector::new();
    let app = App::new(
        &fixtures::client_config("ws://dashboard.test/ws"),
        api.clone(),
        Arc::new(connector.clone()),
        Arc::new(StaticCredentials::anonymous()),
    );
    (app, connector, listener)
}

#[tokio::test(start_paused = true)]
async fn test_order_created_invalidates_reconciliation() {
    let api = Arc::new(MockProcurementApi::new());
    let (app, _connector, mut listener) = app_with(&api);
    assert!(app.start().await.is_empty());
    let peer = listener.accept().await.expect("peer");
    assert_eq!(api.calls(CacheKey::DemandSupplyReconciliation), 1);

    let (tx, mut orders) = mpsc::unbounded_channel();
    let _sub = app.channel().on(EventKind::OrderCreated, move |event| {
        let _ = tx.send(event.clone());
    });
    peer.push(&fixtures::order_created(7, 12.0, Some("abc")))
        .expect("push");

    match orders.recv().await.expect("event") {
        RealtimeEvent::OrderCreated(order) => {
            assert_eq!(order.id, RecordId::Int(7));
            assert_eq!(order.quantity, Some(12.0));
        }
        other => panic!("expected order_created, got {:?}", other),
    }
    assert_eq!(app.channel().state().connection_id.as_deref(), Some("abc"));

    let cache = app.service().cache();
    assert!(!cache.contains(&CacheKey::DemandSupplyReconciliation));
    assert!(cache.contains(&CacheKey::RiskAlerts));

    let read = app
        .service()
        .demand_supply_reconciliation(false)
        .await
        .expect("read");
    assert_cache_miss(&read);
    assert_eq!(read.value().lines[0].demand_quantity, 2.0);
    assert_eq!(api.calls(CacheKey::DemandSupplyReconciliation), 2);

    let risk = app.service().risk_alerts(false).await.expect("read");
    assert_cache_hit(&risk);
    assert_eq!(api.calls(CacheKey::RiskAlerts), 1);
}

#[tokio::test(start_paused = true)]
async fn test_weather_and_farmer_updates() {
    let api = Arc::new(MockProcurementApi::new());
    let (app, _connector, mut listener) = app_with(&api);
    app.start().await;
    let peer = listener.accept().await.expect("peer");

    let (tx, mut seen) = mpsc::unbounded_channel();
    let _sub = app.channel().on_any(move |event| {
        let _ = tx.send(event.kind());
    });

    peer.push(&fixtures::weather_update("Rift Valley")).expect("push");
    assert_eq!(seen.recv().await, Some(EventKind::WeatherUpdate));
    let cache = app.service().cache();
    for horizon in HarvestHorizon::ALL {
        assert!(!cache.contains(&CacheKey::HarvestReadiness(horizon)));
    }
    assert_eq!(cache.len(), 3);

    peer.push(&fixtures::frame(
        "farmer_updated",
        serde_json::json!({ "id": "F-1" }),
        None,
    ))
    .expect("push");
    assert_eq!(seen.recv().await, Some(EventKind::FarmerUpdated));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_events_with_unexpected_payloads_still_invalidate() {
    let api = Arc::new(MockProcurementApi::new());
    let (app, _connector, mut listener) = app_with(&api);
    assert!(app.start().await.is_empty());
    let peer = listener.accept().await.expect("peer");

    let (tx, mut seen) = mpsc::unbounded_channel();
    let _sub = app.channel().on_any(move |event| {
        let _ = tx.send(event.kind());
    });

    peer.push_text(r#"{"event":"order_created","payload":{"order_id":7,"quantity":12}}"#)
        .expect("push");
    assert_eq!(seen.recv().await, Some(EventKind::OrderCreated));
    let cache = app.service().cache();
    assert!(!cache.contains(&CacheKey::DemandSupplyReconciliation));
    assert_eq!(cache.len(), 5);

    peer.push_text(r#"{"event":"farmer_updated","payload":null}"#)
        .expect("push");
    assert_eq!(seen.recv().await, Some(EventKind::FarmerUpdated));
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_warm_reports_failed_reports() {
    let api = Arc::new(MockProcurementApi::new());
    api.set_failing(CacheKey::CostAnalysis, true);
    let (app, _connector, _listener) = app_with(&api);

    let failures = app.start().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, CacheKey::CostAnalysis);
    assert!(matches!(failures[0].1, CacheError::Fetch { .. }));
    assert!(!app.service().cache().contains(&CacheKey::CostAnalysis));
    assert_eq!(app.service().cache().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_risk_alert_becomes_notification() {
    let api = Arc::new(MockProcurementApi::new());
    let (mut app, _connector, mut listener) = app_with(&api);
    app.start().await;
    let peer = listener.accept().await.expect("peer");

    peer.push(&fixtures::risk_alert("critical", "Fall armyworm in Nakuru"))
        .expect("push");
    let notification = app.next_notification().await.expect("notification");
    assert_eq!(notification.level, NotificationLevel::Error);
    assert_eq!(notification.message, "Fall armyworm in Nakuru");
    assert!(!app.service().cache().contains(&CacheKey::RiskAlerts));
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_and_recovery_are_announced() {
    let api = Arc::new(MockProcurementApi::new());
    let (mut app, _connector, mut listener) = app_with(&api);
    app.start().await;
    let peer = listener.accept().await.expect("peer");

    drop(peer);
    let lost = app.next_notification().await.expect("lost");
    assert_eq!(lost.level, NotificationLevel::Warning);

    let _peer = listener.accept().await.expect("reconnected");
    let restored = app.next_notification().await.expect("restored");
    assert_eq!(restored.level, NotificationLevel::Success);
    assert_status(app.channel(), ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_retries_are_exhausted() {
    let api = Arc::new(MockProcurementApi::new());
    let (mut app, connector, _listener) = app_with(&api);
    connector.refuse_connections(true);
    app.start().await;

    let channel = app.channel().clone();
    let exhausted = loop {
        let notification = app.next_notification().await.expect("notification");
        if notification.action == Some(NotificationAction::Reconnect) {
            break notification;
        }
    };
    assert_eq!(exhausted.level, NotificationLevel::Error);

    let outcome = app.run(std::future::pending()).await;
    assert!(matches!(outcome, Err(ClientError::RetriesExhausted)));
    assert_eq!(connector.attempts().len(), 6);
    assert_eq!(channel.subscriber_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_disconnects_on_shutdown() {
    let api = Arc::new(MockProcurementApi::new());
    let (app, _connector, mut listener) = app_with(&api);
    app.start().await;
    let mut peer = listener.accept().await.expect("peer");
    let channel = app.channel().clone();

    app.run(async {}).await.expect("clean shutdown");

    match peer.recv().await {
        Some(Frame::Close(close)) => assert!(close.is_normal()),
        other => panic!("expected close frame, got {:?}", other),
    }
    assert_status(&channel, ConnectionStatus::Disconnected);
    assert_eq!(channel.subscriber_count(), 0);
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    /// Invalidation depends on the event name alone: a payload that fails to
    /// decode clears the same entries, and only known keys are ever named.
    #[test]
    fn prop_invalidation_ignores_payload_shape(frame in arb_inbound_frame()) {
        let decoded = invalidation_for(&RealtimeEvent::from_frame(&frame));
        let mut emptied = frame.clone();
        emptied.payload = serde_json::Value::Null;
        let untyped = invalidation_for(&RealtimeEvent::from_frame(&emptied));
        prop_assert_eq!(&decoded, &untyped);

        if let Some(Invalidation::Keys(keys)) = decoded {
            prop_assert!(!keys.is_empty());
            prop_assert!(keys.iter().all(|key| CacheKey::ALL.contains(key)));
        }
    }
}
