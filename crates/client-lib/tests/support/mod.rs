// ============================
// quickbite-client-lib/tests/support/mod.rs
// ============================
//! Test servers for integration tests.
//!
//! Spins up throwaway axum servers on ephemeral ports: a REST API that
//! mimics the QuickBite backend's auth and profile endpoints, and a
//! websocket endpoint that records inbound frames and can push server
//! frames to the connected client. Keep the returned handles in scope
//! for the duration of the test.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use quickbite_client_lib::config::Settings;
use quickbite_common::{AuthPayload, NewAccount, ProfilePatch, Role, ServerFrame, UserProfile};

pub fn courier_profile() -> UserProfile {
    UserProfile {
        id: "u-100".to_string(),
        name: "Noor".to_string(),
        email: "noor@example.com".to_string(),
        role: Role::DeliveryPerson,
        verified: true,
        avatar_url: None,
        restaurant_id: None,
    }
}

pub fn customer_profile() -> UserProfile {
    UserProfile {
        id: "u-200".to_string(),
        name: "Priya".to_string(),
        email: "priya@example.com".to_string(),
        role: Role::Customer,
        verified: true,
        avatar_url: None,
        restaurant_id: None,
    }
}

pub fn owner_profile() -> UserProfile {
    UserProfile {
        id: "u-300".to_string(),
        name: "Mateo".to_string(),
        email: "mateo@example.com".to_string(),
        role: Role::RestaurantOwner,
        verified: true,
        avatar_url: None,
        restaurant_id: Some("r-55".to_string()),
    }
}

pub const TEST_PASSWORD: &str = "Sup3rSecret";

/// Poll until `condition` holds, failing the test after two seconds
pub async fn wait_for(what: &str, condition: impl Fn() -> bool) {
    timeout(Duration::from_secs(2), async {
        while !condition() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}

// ---------------------------------------------------------------------------
// Mock REST API
// ---------------------------------------------------------------------------

/// Shared state of the mock REST server. Tests mutate it directly to
/// expire tokens or reject refreshes mid-flight.
pub struct MockApi {
    pub profile: parking_lot::Mutex<UserProfile>,
    pub valid_access: parking_lot::Mutex<String>,
    pub valid_refresh: parking_lot::Mutex<String>,
    issued: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub refresh_enabled: AtomicBool,
    pub invalidated: parking_lot::Mutex<Vec<String>>,
    pub uploads: parking_lot::Mutex<Vec<(f64, f64)>>,
}

impl MockApi {
    pub fn new(profile: UserProfile) -> Arc<Self> {
        Arc::new(Self {
            profile: parking_lot::Mutex::new(profile),
            valid_access: parking_lot::Mutex::new(String::new()),
            valid_refresh: parking_lot::Mutex::new(String::new()),
            issued: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            refresh_enabled: AtomicBool::new(true),
            invalidated: parking_lot::Mutex::new(Vec::new()),
            uploads: parking_lot::Mutex::new(Vec::new()),
        })
    }

    /// Invalidate the current access token without touching the refresh
    /// token, as the backend does when an access token ages out
    pub fn expire_access(&self) {
        *self.valid_access.lock() = "expired".to_string();
    }

    fn mint(&self) -> AuthPayload {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("atk-{n}");
        let refresh = format!("rtk-{n}");
        *self.valid_access.lock() = access.clone();
        *self.valid_refresh.lock() = refresh.clone();
        AuthPayload {
            access_token: access,
            refresh_token: refresh,
            user: None,
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn ok(result: Value) -> Response {
    (StatusCode::OK, Json(json!({ "result": result }))).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "invalid or expired token" })),
    )
        .into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshBody {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Deserialize)]
struct LocationBody {
    lat: f64,
    lng: f64,
}

async fn login(State(api): State<Arc<MockApi>>, Json(body): Json<LoginBody>) -> Response {
    let profile = api.profile.lock().clone();
    if body.email != profile.email || body.password != TEST_PASSWORD {
        return unauthorized();
    }
    let mut payload = api.mint();
    payload.user = Some(profile);
    ok(json!(payload))
}

async fn register(State(api): State<Arc<MockApi>>, Json(account): Json<NewAccount>) -> Response {
    let mut profile = api.profile.lock().clone();
    profile.name = account.name;
    profile.email = account.email;
    profile.role = account.role;
    *api.profile.lock() = profile.clone();
    let mut payload = api.mint();
    payload.user = Some(profile);
    ok(json!(payload))
}

async fn password_reset() -> Response {
    ok(Value::Null)
}

async fn refresh(State(api): State<Arc<MockApi>>, Json(body): Json<RefreshBody>) -> Response {
    api.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if !api.refresh_enabled.load(Ordering::SeqCst) {
        return unauthorized();
    }
    if body.refresh_token != *api.valid_refresh.lock() {
        return unauthorized();
    }
    ok(json!(api.mint()))
}

async fn logout(State(api): State<Arc<MockApi>>, Json(body): Json<RefreshBody>) -> Response {
    api.invalidated.lock().push(body.refresh_token);
    ok(Value::Null)
}

async fn me(State(api): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    match bearer(&headers) {
        Some(token) if token == *api.valid_access.lock() => ok(json!(api.profile.lock().clone())),
        _ => unauthorized(),
    }
}

async fn update_profile(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(patch): Json<ProfilePatch>,
) -> Response {
    match bearer(&headers) {
        Some(token) if token == *api.valid_access.lock() => {
            let mut profile = api.profile.lock();
            if let Some(name) = patch.name {
                profile.name = name;
            }
            if let Some(avatar_url) = patch.avatar_url {
                profile.avatar_url = Some(avatar_url);
            }
            ok(json!(profile.clone()))
        },
        _ => unauthorized(),
    }
}

async fn upload_location(
    State(api): State<Arc<MockApi>>,
    headers: HeaderMap,
    Json(body): Json<LocationBody>,
) -> Response {
    match bearer(&headers) {
        Some(token) if token == *api.valid_access.lock() => {
            api.uploads.lock().push((body.lat, body.lng));
            ok(Value::Null)
        },
        _ => unauthorized(),
    }
}

/// Serve the mock API on an ephemeral port; returns its base URL
pub async fn spawn_api(api: Arc<MockApi>) -> String {
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/password-reset", post(password_reset))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/users/me", get(me).patch(update_profile))
        .route("/delivery/location", post(upload_location))
        .with_state(api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock api");
    let addr = listener.local_addr().expect("mock api addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock api crashed");
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Mock realtime endpoint
// ---------------------------------------------------------------------------

/// Shared state of the mock websocket server. Inbound frames are kept
/// as raw JSON tagged with a connection ordinal so tests can assert per
/// connection.
pub struct MockRealtime {
    pub connections: AtomicUsize,
    pub frames: parking_lot::Mutex<Vec<(usize, Value)>>,
    push: parking_lot::Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl MockRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connections: AtomicUsize::new(0),
            frames: parking_lot::Mutex::new(Vec::new()),
            push: parking_lot::Mutex::new(None),
        })
    }

    /// Push a frame to the most recent connection
    pub fn push_frame(&self, frame: &ServerFrame) -> bool {
        let text = serde_json::to_string(frame).expect("encode server frame");
        self.push_raw(&text)
    }

    /// Push arbitrary text, for exercising unknown-event handling
    pub fn push_raw(&self, text: &str) -> bool {
        match self.push.lock().as_ref() {
            Some(tx) => tx.send(text.to_string()).is_ok(),
            None => false,
        }
    }

    /// Inbound frames seen on connection `conn`, oldest first
    pub fn frames_on(&self, conn: usize) -> Vec<Value> {
        self.frames
            .lock()
            .iter()
            .filter(|(id, _)| *id == conn)
            .map(|(_, frame)| frame.clone())
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }
}

async fn realtime_ws(State(state): State<Arc<MockRealtime>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| drive_socket(socket, state))
}

async fn drive_socket(mut socket: WebSocket, state: Arc<MockRealtime>) {
    let id = state.connections.fetch_add(1, Ordering::SeqCst);
    let (push_tx, mut push_rx) = mpsc::unbounded_channel::<String>();
    *state.push.lock() = Some(push_tx);

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(value) = serde_json::from_str::<Value>(text.as_str()) {
                            state.frames.lock().push((id, value));
                        }
                    },
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {},
                }
            },
            outbound = push_rx.recv() => {
                match outbound {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    },
                    None => break,
                }
            },
        }
    }
}

/// Serve the mock realtime endpoint; returns its `ws://` URL
pub async fn spawn_realtime(state: Arc<MockRealtime>) -> String {
    let app = Router::new()
        .route("/realtime", get(realtime_ws))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock realtime");
    let addr = listener.local_addr().expect("mock realtime addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock realtime crashed");
    });
    format!("ws://{addr}/realtime")
}

/// Settings pointed at the mock servers, with fast location playback
pub fn test_settings(api_base_url: &str, realtime_url: &str, data_dir: &std::path::Path) -> Settings {
    let mut settings = Settings {
        api_base_url: api_base_url.to_string(),
        realtime_url: realtime_url.to_string(),
        data_dir: data_dir.to_path_buf(),
        ..Settings::default()
    };
    settings.location.interval_secs = 1;
    settings.location.fastest_interval_secs = 1;
    settings
}
