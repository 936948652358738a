//! RPC surface (C9, external collaborator per spec §1/§6).
//!
//! A narrow HTTP/JSON API servicing the four operations the core must answer
//! (`GetStunInfo`, `StartConnection`, `StopConnection`, `StopProcess`) plus the
//! reserved `GetConnectionStatus` no-op. Grounded on
//! `examples/yaimbo-secure-guard/src/daemon/{mod.rs,routes.rs}`'s axum
//! bootstrap and REST route-handler shape, narrowed to this system's five
//! operations; request/response envelopes are plain structs in the style of
//! `routes.rs::ApiError` rather than the teacher's much larger peer-management
//! surface. `examples/original_source/networking/include/interfaces/IIPCServer.hpp`
//! grounds the operation names and callback shape this module's handlers mirror.

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::addr;
use crate::error::MinnowVpnError;
use crate::state::{NetworkEvent, SystemState};
use crate::supervisor::SupervisorHandle;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub overlay_base: std::net::Ipv4Addr,
}

/// Bind and serve the RPC surface until the process is shut down. `listen_addr`
/// is e.g. `0.0.0.0:50051` (spec §6 configuration).
pub async fn serve(listen_addr: &str, state: AppState) -> Result<(), MinnowVpnError> {
    let app = build_router(state);

    let addr: SocketAddr = listen_addr
        .parse()
        .map_err(|_| MinnowVpnError::Config(crate::error::ConfigError::InvalidAddress {
            value: listen_addr.to_string(),
        }))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "RPC surface listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/stun-info", get(get_stun_info))
        .route("/api/v1/connect", post(start_connection))
        .route("/api/v1/disconnect", post(stop_connection))
        .route("/api/v1/shutdown", post(stop_process))
        .route("/api/v1/status", get(get_connection_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Uniform error envelope, matching the teacher's `ApiError` shape.
#[derive(Debug, Serialize)]
struct ApiError {
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Response {
        (StatusCode::BAD_REQUEST, Json(ApiError { message: message.into() })).into_response()
    }
}

/// `GetStunInfo`: returns the reflexive address and public key discovered
/// during bring-up, or an error if discovery never completed (in practice
/// `initialize` aborts before the RPC surface starts if STUN fails, so this
/// handler only ever reports success — the error path exists for interface
/// completeness per spec §6).
#[derive(Debug, Serialize)]
struct StunInfoResponse {
    public_ip: String,
    public_port: u16,
    public_key: String,
}

async fn get_stun_info(State(state): State<AppState>) -> Json<StunInfoResponse> {
    let info = state.supervisor.stun_info;
    Json(StunInfoResponse {
        public_ip: info.public_ip.to_string(),
        public_port: info.public_port,
        public_key: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, info.public_key),
    })
}

/// `StartConnection`: one peer-list entry per slot, `"self"`/`"unavailable"`
/// markers included; `public_keys` supplies one base64 key per non-marker
/// entry, in order (spec §6).
#[derive(Debug, Deserialize)]
struct StartConnectionRequest {
    peers: Vec<String>,
    public_keys: Vec<String>,
    self_index: usize,
    #[serde(default)]
    should_fail: bool,
}

#[derive(Debug, Serialize)]
struct StartConnectionResponse {
    success: bool,
    error_message: Option<String>,
}

async fn start_connection(
    State(state): State<AppState>,
    Json(req): Json<StartConnectionRequest>,
) -> Response {
    if req.should_fail {
        return Json(StartConnectionResponse {
            success: false,
            error_message: Some("forced failure requested".to_string()),
        })
        .into_response();
    }

    if state.supervisor.state.state() != SystemState::Idle {
        return Json(StartConnectionResponse {
            success: false,
            error_message: Some("already connected".to_string()),
        })
        .into_response();
    }

    let mut peer_keys = Vec::with_capacity(req.public_keys.len());
    for key_b64 in &req.public_keys {
        let Ok(bytes) = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, key_b64) else {
            return ApiError::bad_request(format!("invalid base64 public key: {}", key_b64));
        };
        let Ok(key): Result<[u8; 32], _> = bytes.try_into() else {
            return ApiError::bad_request("public key must be 32 bytes");
        };
        peer_keys.push(key);
    }

    // Validate up front so a malformed list responds `success=false` without
    // transitioning state, per spec §7 `InvalidPeerList`.
    if addr::parse_peer_list_text(&req.peers, &peer_keys, state.overlay_base, req.self_index).is_err() {
        return Json(StartConnectionResponse {
            success: false,
            error_message: Some("invalid peer list".to_string()),
        })
        .into_response();
    }

    state.supervisor.state.queue_event(NetworkEvent::InitializeConnection {
        self_index: req.self_index,
        peers: req.peers,
        peer_keys,
    });

    Json(StartConnectionResponse {
        success: true,
        error_message: None,
    })
    .into_response()
}

#[derive(Debug, Serialize)]
struct SimpleResponse {
    success: bool,
    message: String,
}

/// `StopConnection`: enqueues `DISCONNECT_ALL_REQUESTED`; always reports
/// success (the monitor loop ignores the event outside a connected/connecting
/// state, per §4.5's "invalid transitions are silently ignored").
async fn stop_connection(State(state): State<AppState>) -> Json<SimpleResponse> {
    state.supervisor.state.queue_event(NetworkEvent::DisconnectAllRequested);
    Json(SimpleResponse {
        success: true,
        message: "disconnect requested".to_string(),
    })
}

#[derive(Debug, Deserialize, Default)]
struct StopProcessRequest {
    #[serde(default)]
    force: bool,
}

/// `StopProcess`: `force=true` exits the process immediately after logging;
/// `force=false` enqueues `SHUTDOWN_REQUESTED` and lets the monitor drive
/// graceful teardown (spec §5 "Cancellation and timeouts").
async fn stop_process(
    State(state): State<AppState>,
    body: Option<Json<StopProcessRequest>>,
) -> Json<SimpleResponse> {
    let force = body.map(|Json(r)| r.force).unwrap_or(false);

    if force {
        tracing::warn!("forced shutdown requested via RPC, exiting immediately");
        std::process::exit(0);
    }

    state.supervisor.state.queue_event(NetworkEvent::ShutdownRequested);
    Json(SimpleResponse {
        success: true,
        message: "graceful shutdown requested".to_string(),
    })
}

/// `GetConnectionStatus`: unimplemented in the reference source; kept as a
/// no-op returning success with no body (spec §9 open question (b)).
async fn get_connection_status() -> StatusCode {
    StatusCode::OK
}
