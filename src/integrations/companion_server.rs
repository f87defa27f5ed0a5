//! Local HTTP control server for companion apps (stream decks, mobile remotes).
//!
//! Routes:
//! - `GET  /metadata` - supported API versions, unauthenticated
//! - `GET  /api/v1/state` - canonical player state
//! - `POST /api/v1/command` - a [`RemoteCommand`], forwarded to the player view
//! - `POST /api/v1/auth/requestcode` - start pairing, only while the auth window is open
//! - `POST /api/v1/auth/request` - exchange the pairing code for a token once
//!   the user has confirmed it on the host
//!
//! State and command routes require an `Authorization` header carrying a
//! token previously issued through pairing.

use super::{Integration, IntegrationContext, IntegrationError};
use crate::config::ConfigStore;
use crate::models::{PlayerState, RemoteCommand};
use crate::services::PlayerStateAggregator;
use crate::state::{COMPANION_AUTH_WINDOW_KEY, EphemeralStore};
use crate::ui::{BroadcastRouter, ShellHost, SurfaceKind};
use async_trait::async_trait;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

const NAME: &str = "companion-server";

/// Pairings awaiting exchange at once; further code requests are refused.
pub const MAX_PENDING_PAIRINGS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Player unavailable")]
    Unavailable,

    #[error("Too many pending pairing requests")]
    TooManyRequests,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    pub app_id: String,
    pub app_name: String,
    pub app_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub app_id: String,
    pub code: String,
}

#[derive(Debug, Clone)]
struct PendingPairing {
    app_name: String,
    code: String,
}

/// Equality whose running time depends only on the lengths.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// State shared by the request handlers of one server instance.
#[derive(Clone)]
struct ApiState {
    config: ConfigStore,
    ephemeral: EphemeralStore,
    player: PlayerStateAggregator,
    router: BroadcastRouter,
    host: Arc<dyn ShellHost>,
    /// Pairings by app id, valid until exchanged.
    pending: Arc<Mutex<HashMap<String, PendingPairing>>>,
}

impl ApiState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v))
            .ok_or(ApiError::Unauthorized)?;

        // Every stored token is compared, so timing reveals neither match nor position
        let known = self.config.read(|c| {
            c.credentials
                .companion_server_auth_tokens
                .iter()
                .fold(false, |found, t| constant_time_eq(t, token) | found)
        });
        if known { Ok(()) } else { Err(ApiError::Unauthorized) }
    }

    fn require_auth_window(&self) -> Result<(), ApiError> {
        if self.ephemeral.get_flag(COMPANION_AUTH_WINDOW_KEY) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Authorization requests are disabled".to_string()))
        }
    }
}

/// Build the HTTP routes. `cors_wildcard` adds a permissive CORS layer.
pub fn api_router(ctx: &IntegrationContext, cors_wildcard: bool) -> Router {
    let state = ApiState {
        config: ctx.config.clone(),
        ephemeral: ctx.ephemeral.clone(),
        player: ctx.player.clone(),
        router: ctx.router.clone(),
        host: Arc::clone(&ctx.host),
        pending: Arc::new(Mutex::new(HashMap::new())),
    };

    let app = Router::new()
        .route("/metadata", get(metadata))
        .route("/api/v1/state", get(player_state))
        .route("/api/v1/command", post(command))
        .route("/api/v1/auth/requestcode", post(request_code))
        .route("/api/v1/auth/request", post(request_token))
        .with_state(state);

    if cors_wildcard {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

async fn metadata() -> Json<Value> {
    Json(json!({ "apiVersions": ["v1"] }))
}

async fn player_state(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<PlayerState>, ApiError> {
    state.authorize(&headers)?;
    Ok(Json(state.player.snapshot()))
}

async fn command(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(command): Json<RemoteCommand>,
) -> Result<StatusCode, ApiError> {
    state.authorize(&headers)?;

    tracing::debug!("Companion command: {:?}", command);
    if state
        .router
        .send_serialized(SurfaceKind::PlayerView, "remoteControl:execute", &command)
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Unavailable)
    }
}

async fn request_code(
    State(state): State<ApiState>,
    Json(request): Json<CodeRequest>,
) -> Result<Json<Value>, ApiError> {
    state.require_auth_window()?;

    let code = format!("{:05}", Uuid::new_v4().as_u128() % 100_000);
    tracing::info!(
        "Pairing requested by {} {} ({})",
        request.app_name,
        request.app_version,
        request.app_id
    );

    let mut pending = state.pending.lock().unwrap_or_else(|e| e.into_inner());
    if pending.len() >= MAX_PENDING_PAIRINGS && !pending.contains_key(&request.app_id) {
        tracing::warn!("Refusing pairing for {}: too many pending", request.app_id);
        return Err(ApiError::TooManyRequests);
    }
    pending.insert(
        request.app_id,
        PendingPairing {
            app_name: request.app_name,
            code: code.clone(),
        },
    );

    Ok(Json(json!({ "code": code })))
}

async fn request_token(
    State(state): State<ApiState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<Value>, ApiError> {
    state.require_auth_window()?;

    let pairing = state
        .pending
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .remove(&request.app_id)
        .filter(|p| constant_time_eq(&p.code, &request.code))
        .ok_or_else(|| ApiError::Forbidden("Invalid pairing code".to_string()))?;

    let host = Arc::clone(&state.host);
    let approved = tokio::task::spawn_blocking(move || host.confirm_pairing(&pairing.app_name, &pairing.code))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !approved {
        tracing::warn!("Pairing of {} declined by the user", request.app_id);
        return Err(ApiError::Forbidden("Pairing was declined".to_string()));
    }

    let token = Uuid::new_v4().simple().to_string();
    state
        .config
        .update(|c| c.credentials.companion_server_auth_tokens.push(token.clone()))
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!("Issued companion token to {}", request.app_id);
    Ok(Json(json!({ "token": token })))
}

struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Serves [`api_router`] on `127.0.0.1:<companionServerPort>`.
///
/// The listener options are read at enable time, so port and CORS changes
/// need a restart.
#[derive(Default)]
pub struct CompanionServer {
    ctx: Option<IntegrationContext>,
    running: Option<RunningServer>,
}

impl CompanionServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }
}

#[async_trait]
impl Integration for CompanionServer {
    fn provide(&mut self, ctx: IntegrationContext) {
        self.ctx = Some(ctx);
    }

    async fn enable(&mut self) -> Result<(), IntegrationError> {
        let ctx = self.ctx.as_ref().ok_or(IntegrationError::MissingContext(NAME))?;
        if self.running.is_some() {
            return Ok(());
        }

        let (port, cors_wildcard) = ctx.config.read(|c| {
            (
                c.integrations.companion_server_port,
                c.integrations.companion_server_cors_wildcard_enabled,
            )
        });

        let io_error = |source| IntegrationError::Io { name: NAME, source };
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(io_error)?;
        let local_addr = listener.local_addr().map_err(io_error)?;

        let app = api_router(ctx, cors_wildcard);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            "Companion server listening on {} (CORS wildcard: {})",
            local_addr,
            cors_wildcard
        );
        self.running = Some(RunningServer {
            local_addr,
            shutdown_tx,
            task,
        });
        Ok(())
    }

    async fn disable(&mut self) -> Result<(), IntegrationError> {
        let Some(server) = self.running.take() else {
            return Ok(());
        };

        let _ = server.shutdown_tx.send(());
        match server.task.await {
            Ok(Ok(())) => {
                tracing::info!("Companion server on {} stopped", server.local_addr);
                Ok(())
            }
            Ok(Err(source)) => Err(IntegrationError::Io { name: NAME, source }),
            Err(e) => Err(IntegrationError::Disable {
                name: NAME,
                message: e.to_string(),
            }),
        }
    }
}
