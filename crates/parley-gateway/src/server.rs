// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use parley_config::model::ServerConfig;
use parley_core::ParleyError;
use parley_relay::Coordinator;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{SessionManager, require_agent};
use crate::{handlers, sse};

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<Coordinator>,
    /// Also installed as the coordinator's session authority.
    pub sessions: Arc<SessionManager>,
    /// Process start time for uptime calculation.
    pub start_time: Instant,
}

impl GatewayState {
    pub fn new(coordinator: Arc<Coordinator>, sessions: Arc<SessionManager>) -> Self {
        Self {
            coordinator,
            sessions,
            start_time: Instant::now(),
        }
    }
}

/// Build the full route table.
///
/// Public: visitor stream and actions, status, presence, history, standalone
/// responder questions, login, health. Agent-only (session required):
/// console stream, agent message, online toggle, conversation list and
/// delete, logout.
pub fn build_router(state: GatewayState, cors_permissive: bool) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/sse/stream/{conversation_id}", get(sse::visitor_stream))
        .route("/api/client/message", post(handlers::post_client_message))
        .route("/api/client/heartbeat", post(handlers::post_heartbeat))
        .route(
            "/api/client/presence/{conversation_id}",
            get(handlers::get_client_presence),
        )
        .route("/api/typing", post(handlers::post_typing))
        .route("/api/seen", post(handlers::post_seen))
        .route("/api/status", get(handlers::get_status))
        .route("/api/ai", post(handlers::post_ask))
        .route(
            "/api/chat/history/{conversation_id}",
            get(handlers::get_history),
        )
        .route("/admin/login", post(handlers::post_login))
        .with_state(state.clone());

    let agent_routes = Router::new()
        .route("/sse/admin", get(sse::admin_stream))
        .route("/api/agent/message", post(handlers::post_agent_message))
        .route("/api/agent/online", post(handlers::post_agent_online))
        .route("/api/clients", get(handlers::get_clients))
        .route(
            "/api/clients/{conversation_id}",
            delete(handlers::delete_client),
        )
        .route("/admin/logout", post(handlers::post_logout))
        .route_layer(axum_middleware::from_fn_with_state(
            Arc::clone(&state.sessions),
            require_agent,
        ))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(agent_routes)
        .layer(TraceLayer::new_for_http());

    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: F,
) -> Result<(), ParleyError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state, config.cors_permissive);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
