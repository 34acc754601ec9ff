// ============================
// quickbite-client-lib/tests/realtime_flow.rs
// ============================
//! Realtime flows over a real websocket transport against a mock
//! endpoint, driven by hand-published auth snapshots.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::watch;

use quickbite_client_lib::auth::AuthSnapshot;
use quickbite_client_lib::realtime::{RealtimeManager, RealtimeTransport, UpdateKind, WsTransport};
use quickbite_common::{OrderStatus, ServerFrame, UserProfile};

use support::{courier_profile, owner_profile, spawn_realtime, wait_for, MockRealtime};

fn authed(profile: UserProfile, token: &str, generation: u64) -> AuthSnapshot {
    AuthSnapshot {
        user: Some(profile),
        access_token: Some(token.to_string()),
        generation,
    }
}

async fn setup() -> (RealtimeManager, Arc<MockRealtime>, watch::Sender<AuthSnapshot>) {
    let state = MockRealtime::new();
    let url = spawn_realtime(state.clone()).await;
    let (tx, rx) = watch::channel(AuthSnapshot::default());
    let transport: Arc<dyn RealtimeTransport> = Arc::new(WsTransport);
    let manager = RealtimeManager::new(transport, rx, url, 64);
    (manager, state, tx)
}

#[tokio::test]
async fn joins_travel_over_a_real_websocket() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();

    wait_for("connection", || manager.is_connected()).await;
    wait_for("handshake frames", || state.frame_count() >= 3).await;

    let frames = state.frames_on(0);
    assert_eq!(frames[0], json!({ "event": "auth", "data": { "token": "tok-1" } }));
    assert_eq!(frames[1], json!({ "event": "join:user" }));
    assert_eq!(frames[2], json!({ "event": "join:delivery" }));
}

#[tokio::test]
async fn restaurant_owner_join_carries_the_restaurant_id() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(owner_profile(), "tok-1", 1)).unwrap();

    wait_for("connection", || manager.is_connected()).await;
    wait_for("handshake frames", || state.frame_count() >= 3).await;

    let frames = state.frames_on(0);
    assert_eq!(
        frames[2],
        json!({ "event": "join:restaurant", "data": { "restaurantId": "r-55" } })
    );
}

#[tokio::test]
async fn server_frames_reach_the_buffers() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();
    wait_for("connection", || manager.is_connected()).await;

    assert!(state.push_frame(&ServerFrame::OrderAssigned {
        order_id: "o-77".to_string(),
        restaurant_id: Some("r-55".to_string()),
    }));

    wait_for("buffered assignment", || {
        manager.update_count(UpdateKind::Delivery) == 1
    })
    .await;
    let records = manager.updates(UpdateKind::Delivery);
    assert_eq!(records[0].record_type, "order_assigned");
    assert_eq!(records[0].frame.order_id(), "o-77");
}

#[tokio::test]
async fn unknown_events_are_skipped() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();
    wait_for("connection", || manager.is_connected()).await;

    assert!(state.push_raw(r#"{"event":"promo:flash","data":{"code":"YUM"}}"#));
    assert!(state.push_frame(&ServerFrame::LocationUpdated {
        order_id: "o-1".to_string(),
        lat: -33.86,
        lng: 151.21,
    }));

    wait_for("known frame", || manager.update_count(UpdateKind::Delivery) == 1).await;
    assert!(manager.is_connected());
    assert_eq!(manager.updates(UpdateKind::Delivery)[0].record_type, "location_update");
}

#[tokio::test]
async fn token_rotation_reconnects_with_the_fresh_token() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();
    wait_for("first connection", || manager.is_connected()).await;

    assert!(state.push_frame(&ServerFrame::OrderAssigned {
        order_id: "o-1".to_string(),
        restaurant_id: None,
    }));
    wait_for("buffered assignment", || {
        manager.update_count(UpdateKind::Delivery) == 1
    })
    .await;

    tx.send(authed(courier_profile(), "tok-2", 2)).unwrap();
    wait_for("reconnect", || {
        state.connections.load(Ordering::SeqCst) == 2 && manager.is_connected()
    })
    .await;

    wait_for("fresh handshake", || !state.frames_on(1).is_empty()).await;
    assert_eq!(
        state.frames_on(1)[0],
        json!({ "event": "auth", "data": { "token": "tok-2" } })
    );
    // Rotation is not a sign-out; the pending assignment survives
    assert_eq!(manager.update_count(UpdateKind::Delivery), 1);
}

#[tokio::test]
async fn emits_reach_the_server() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();
    wait_for("connection", || manager.is_connected()).await;
    wait_for("handshake frames", || state.frame_count() >= 3).await;
    let handshake = state.frame_count();

    assert!(manager.send_order_status("o-5", OrderStatus::OutForDelivery, None));
    assert!(manager.send_location_update("o-5", -33.87, 151.2));

    wait_for("emitted frames", || state.frame_count() >= handshake + 2).await;
    let frames = state.frames_on(0);
    assert_eq!(
        frames[handshake],
        json!({ "event": "order:status", "data": { "orderId": "o-5", "status": "out_for_delivery" } })
    );
    assert_eq!(
        frames[handshake + 1],
        json!({ "event": "location:update", "data": { "orderId": "o-5", "lat": -33.87, "lng": 151.2 } })
    );
}

#[tokio::test]
async fn signing_out_closes_the_connection_and_clears_buffers() {
    let (manager, state, tx) = setup().await;
    tx.send(authed(courier_profile(), "tok-1", 1)).unwrap();
    wait_for("connection", || manager.is_connected()).await;

    assert!(state.push_frame(&ServerFrame::OrderAssigned {
        order_id: "o-1".to_string(),
        restaurant_id: None,
    }));
    wait_for("buffered assignment", || {
        manager.update_count(UpdateKind::Delivery) == 1
    })
    .await;

    tx.send(AuthSnapshot::default()).unwrap();
    wait_for("disconnect", || !manager.is_connected()).await;

    assert!(manager.updates(UpdateKind::Delivery).is_empty());
    assert!(!manager.send_order_status("o-1", OrderStatus::Delivered, None));
    assert_eq!(state.connections.load(Ordering::SeqCst), 1);
}
