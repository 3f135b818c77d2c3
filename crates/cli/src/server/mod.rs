//! HTTP / WebSocket surface
//!
//! One route per subscriber role plus the settings channel and a health
//! check. Each connection is split into a hub-driven writer and a reader
//! that either relays commands or only watches for the peer going away.

mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use broadcast::{BroadcastHub, CommandRelay, SettingsChannel};
use contracts::{CommandSource, SubscriberRole};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const HEALTH_PATH: &str = "/health";
pub const SETTINGS_PATH: &str = "/ws/setting";

/// Route serving a subscriber role.
pub fn role_path(role: SubscriberRole) -> &'static str {
    match role {
        SubscriberRole::Data => "/ws/data",
        SubscriberRole::Image => "/ws/image",
        SubscriberRole::Control => "/ws/control",
        SubscriberRole::Bridge => "/ws/ros_teleop_bridge",
    }
}

/// Shared by every connection handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<BroadcastHub>,
    pub relay: CommandRelay,
    pub settings: Arc<SettingsChannel>,
    pub cancel: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(role_path(SubscriberRole::Data), get(data_handler))
        .route(role_path(SubscriberRole::Image), get(image_handler))
        .route(role_path(SubscriberRole::Control), get(control_handler))
        .route(role_path(SubscriberRole::Bridge), get(bridge_handler))
        .route(SETTINGS_PATH, get(settings_handler))
        .with_state(state)
}

/// Serve until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn data_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_only(socket, addr, state, SubscriberRole::Data))
}

async fn image_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_only(socket, addr, state, SubscriberRole::Image))
}

async fn control_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_and_relay(socket, addr, state, SubscriberRole::Control))
}

async fn bridge_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| push_and_relay(socket, addr, state, SubscriberRole::Bridge))
}

async fn settings_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| settings_session(socket, addr, state))
}

/// `data` / `image`: inbound messages are ignored, reading only detects close.
async fn push_only(socket: WebSocket, addr: SocketAddr, state: AppState, role: SubscriberRole) {
    let (sink, mut source) = ws::split(socket, addr.to_string());
    let subscription = match state.hub.subscribe(role, sink) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(peer = %addr, role = %role, error = %e, "subscription refused");
            return;
        }
    };
    let writer_done = subscription.cancel_token();

    tokio::select! {
        _ = writer_done.cancelled() => {}
        _ = drain(&mut source) => {
            state.hub.unsubscribe(subscription.id());
        }
    }
    let outcome = subscription.finished().await;
    debug!(peer = %addr, role = %role, outcome = ?outcome, "connection closed");
}

/// `control` / `bridge`: state is pushed while commands are relayed.
async fn push_and_relay(socket: WebSocket, addr: SocketAddr, state: AppState, role: SubscriberRole) {
    let (sink, source) = ws::split(socket, addr.to_string());
    let subscription = match state.hub.subscribe(role, sink) {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(peer = %addr, role = %role, error = %e, "subscription refused");
            return;
        }
    };

    let stats = state
        .relay
        .run(source, role.as_str(), subscription.cancel_token())
        .await;
    state.hub.unsubscribe(subscription.id());
    let outcome = subscription.finished().await;
    debug!(
        peer = %addr,
        role = %role,
        outcome = ?outcome,
        forwarded = stats.forwarded,
        "connection closed"
    );
}

async fn settings_session(socket: WebSocket, addr: SocketAddr, state: AppState) {
    info!(peer = %addr, "settings connection opened");
    let (sink, source) = ws::split(socket, addr.to_string());
    let stats = state
        .settings
        .run(source, sink, state.cancel.child_token())
        .await;
    info!(
        peer = %addr,
        received = stats.received,
        errors = stats.errors,
        "settings connection closed"
    );
}

/// Read until the peer closes or the connection fails.
async fn drain<S: CommandSource>(source: &mut S) {
    while let Some(Ok(_)) = source.recv().await {}
}
