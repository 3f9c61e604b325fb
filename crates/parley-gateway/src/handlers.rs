// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON action endpoints.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use parley_core::{
    AgentPresence, ConversationId, ConversationSummary, HealthStatus, Message, MessageId,
    ParleyError, Party,
};
use serde::{Deserialize, Serialize};

use crate::auth::{AgentSession, cleared_cookie, session_cookie};
use crate::error::{ApiError, ApiJson};
use crate::server::GatewayState;

/// Bare `{ok: true}`.
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

const OK: OkResponse = OkResponse { ok: true };

#[derive(Debug, Deserialize)]
pub struct ClientMessageRequest {
    pub conversation_id: String,
    pub text: String,
    #[serde(default)]
    pub client_temp_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AgentMessageRequest {
    pub conversation_id: String,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct MessageAccepted {
    pub ok: bool,
    pub message_id: MessageId,
}

/// POST /api/client/message
pub async fn post_client_message(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<ClientMessageRequest>,
) -> Result<Json<MessageAccepted>, ApiError> {
    let submission = state
        .coordinator
        .submit_visitor_message(&body.conversation_id, &body.text, body.client_temp_id)
        .await?;
    Ok(Json(MessageAccepted {
        ok: true,
        message_id: submission.message_id,
    }))
}

/// POST /api/agent/message
pub async fn post_agent_message(
    State(state): State<GatewayState>,
    Extension(AgentSession(token)): Extension<AgentSession>,
    ApiJson(body): ApiJson<AgentMessageRequest>,
) -> Result<Json<MessageAccepted>, ApiError> {
    let message_id = state
        .coordinator
        .submit_agent_message(&token, &body.conversation_id, &body.text)
        .await?;
    Ok(Json(MessageAccepted {
        ok: true,
        message_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct TypingRequest {
    pub conversation_id: String,
    pub who: Party,
    pub state: bool,
}

/// POST /api/typing
pub async fn post_typing(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<TypingRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .set_typing(&body.conversation_id, body.who, body.state)?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct SeenRequest {
    pub conversation_id: String,
    pub by: Party,
    #[serde(default)]
    pub message_ids: Option<Vec<MessageId>>,
}

#[derive(Debug, Serialize)]
pub struct SeenResponse {
    pub ok: bool,
    pub message_ids: Vec<MessageId>,
}

/// POST /api/seen
pub async fn post_seen(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<SeenRequest>,
) -> Result<Json<SeenResponse>, ApiError> {
    let message_ids = state
        .coordinator
        .mark_seen(&body.conversation_id, body.by, body.message_ids)
        .await?;
    Ok(Json(SeenResponse {
        ok: true,
        message_ids,
    }))
}

#[derive(Debug, Deserialize)]
pub struct OnlineRequest {
    pub online: bool,
}

#[derive(Debug, Serialize)]
pub struct OnlineResponse {
    pub ok: bool,
    #[serde(flatten)]
    pub presence: AgentPresence,
}

/// POST /api/agent/online
pub async fn post_agent_online(
    State(state): State<GatewayState>,
    Extension(AgentSession(token)): Extension<AgentSession>,
    ApiJson(body): ApiJson<OnlineRequest>,
) -> Result<Json<OnlineResponse>, ApiError> {
    let presence = state
        .coordinator
        .set_agent_presence(&token, body.online)
        .await?;
    Ok(Json(OnlineResponse { ok: true, presence }))
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub ok: bool,
    pub text: String,
}

/// POST /api/ai
///
/// One-off question to the automated responder, outside any conversation.
/// 503 when no responder is configured, 504 when it does not answer in time.
pub async fn post_ask(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let text = state.coordinator.ask_responder(&body.question).await?;
    Ok(Json(AskResponse { ok: true, text }))
}

/// GET /api/status
pub async fn get_status(
    State(state): State<GatewayState>,
) -> Result<Json<AgentPresence>, ApiError> {
    Ok(Json(state.coordinator.agent_presence().await?))
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    pub conversation_id: String,
}

/// POST /api/client/heartbeat
pub async fn post_heartbeat(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<HeartbeatRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    state.coordinator.heartbeat(&body.conversation_id).await?;
    Ok(Json(OK))
}

#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    pub conversation_id: ConversationId,
    pub online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// GET /api/client/presence/{conversation_id}
///
/// An unknown conversation reports offline with no `last_seen_at`.
pub async fn get_client_presence(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
) -> Result<Json<PresenceResponse>, ApiError> {
    let conversation = ConversationId::parse(&conversation_id)?;
    let presence = state.coordinator.client_presence(conversation.as_str()).await?;
    Ok(Json(PresenceResponse {
        conversation_id: conversation,
        online: presence.as_ref().is_some_and(|p| p.online),
        last_seen_at: presence.map(|p| p.last_seen_at),
    }))
}

#[derive(Debug, Serialize)]
pub struct ClientsResponse {
    pub clients: Vec<ConversationSummary>,
}

/// GET /api/clients
pub async fn get_clients(
    State(state): State<GatewayState>,
    Extension(AgentSession(token)): Extension<AgentSession>,
) -> Result<Json<ClientsResponse>, ApiError> {
    let clients = state.coordinator.conversation_summaries(&token).await?;
    Ok(Json(ClientsResponse { clients }))
}

/// DELETE /api/clients/{conversation_id}
pub async fn delete_client(
    State(state): State<GatewayState>,
    Extension(AgentSession(token)): Extension<AgentSession>,
    Path(conversation_id): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .coordinator
        .delete_conversation(&token, &conversation_id)
        .await?;
    Ok(Json(OK))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub conversation_id: ConversationId,
    pub messages: Vec<Message>,
}

/// GET /api/chat/history/{conversation_id}?limit=N
pub async fn get_history(
    State(state): State<GatewayState>,
    Path(conversation_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let conversation = ConversationId::parse(&conversation_id)?;
    let messages = state
        .coordinator
        .history(conversation.as_str(), query.limit)
        .await?;
    Ok(Json(HistoryResponse {
        conversation_id: conversation,
        messages,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub ok: bool,
    pub token: String,
}

/// POST /admin/login
///
/// Opens a session and brings the agent online.
pub async fn post_login(
    State(state): State<GatewayState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let token = state
        .sessions
        .login(&body.username, &body.password)
        .ok_or(ApiError(ParleyError::Unauthorized))?;
    if let Err(err) = state.coordinator.set_agent_presence(&token, true).await {
        state.sessions.logout(&token);
        return Err(err.into());
    }
    let cookie = session_cookie(&token, state.sessions.ttl());
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            ok: true,
            token: token.expose().to_string(),
        }),
    )
        .into_response())
}

/// POST /admin/logout
///
/// Takes the agent offline and ends the session.
pub async fn post_logout(
    State(state): State<GatewayState>,
    Extension(AgentSession(token)): Extension<AgentSession>,
) -> Result<Response, ApiError> {
    let result = state.coordinator.set_agent_presence(&token, false).await;
    state.sessions.logout(&token);
    result?;
    Ok(([(header::SET_COOKIE, cleared_cookie())], Json(OK)).into_response())
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Hub channels with at least one live subscriber.
    pub channels: usize,
    pub responder_configured: bool,
}

/// GET /health
///
/// Unauthenticated. Answers 503 when the store is unreachable.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let (code, status) = match state.coordinator.health().await {
        Ok(HealthStatus::Healthy) => (StatusCode::OK, "healthy".to_string()),
        Ok(HealthStatus::Unhealthy(reason)) => {
            (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {reason}"))
        }
        Err(err) => (StatusCode::SERVICE_UNAVAILABLE, format!("unhealthy: {err}")),
    };
    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        channels: state.coordinator.hub().channel_count(),
        responder_configured: state.coordinator.has_responder(),
    };
    (code, Json(body)).into_response()
}
