// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent sessions and the authentication middleware.
//!
//! A session token is accepted from either place (checked in order):
//! 1. `Authorization: Bearer <token>`
//! 2. the `parley_session` cookie set by `POST /admin/login`
//!
//! When no password is configured, login is disabled and every protected
//! route answers 401.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, Cookie, HeaderMapExt, authorization::Bearer};
use dashmap::DashMap;
use parley_config::model::AgentConfig;
use parley_core::{ParleyError, SessionAuthority, SessionToken};
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::error::ApiError;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "parley_session";

/// In-memory agent sessions with a fixed lifetime.
///
/// Sessions do not survive a restart.
pub struct SessionManager {
    /// token -> expiry
    sessions: DashMap<String, Instant>,
    username: String,
    password: Option<String>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("ttl", &self.ttl)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl SessionManager {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            username: config.username.clone(),
            password: config.password.clone(),
            ttl: Duration::from_secs(config.session_ttl_secs),
        }
    }

    pub fn login_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Check credentials and open a new session.
    pub fn login(&self, username: &str, password: &str) -> Option<SessionToken> {
        let expected = self.password.as_deref()?;
        let user_ok = username.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = password.as_bytes().ct_eq(expected.as_bytes());
        if !bool::from(user_ok & pass_ok) {
            tracing::warn!(username, "agent login rejected");
            return None;
        }

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.sessions.insert(token.clone(), Instant::now() + self.ttl);
        self.purge_expired();
        tracing::info!(username, "agent logged in");
        Some(SessionToken::new(token))
    }

    /// End a session. Returns false when it was not active.
    pub fn logout(&self, token: &SessionToken) -> bool {
        self.sessions.remove(token.expose()).is_some()
    }

    /// Number of unexpired sessions.
    pub fn active_sessions(&self) -> usize {
        self.purge_expired();
        self.sessions.len()
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.sessions.retain(|_, expiry| *expiry > now);
    }
}

impl SessionAuthority for SessionManager {
    fn is_authenticated(&self, token: &SessionToken) -> bool {
        let now = Instant::now();
        let live = self
            .sessions
            .get(token.expose())
            .is_some_and(|expiry| *expiry > now);
        if !live {
            self.sessions.remove_if(token.expose(), |_, expiry| *expiry <= now);
        }
        live
    }
}

/// The caller's session token, from the bearer header or the session cookie.
pub fn session_token(headers: &HeaderMap) -> Option<SessionToken> {
    if let Some(auth) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(SessionToken::new(auth.token()));
    }
    headers
        .typed_get::<Cookie>()
        .and_then(|cookie| cookie.get(SESSION_COOKIE).map(SessionToken::new))
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(token: &SessionToken, ttl: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token.expose(),
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn cleared_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Authenticated agent session, inserted by [`require_agent`].
#[derive(Debug, Clone)]
pub struct AgentSession(pub SessionToken);

/// Middleware for agent-only routes.
pub async fn require_agent(
    State(sessions): State<Arc<SessionManager>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .filter(|token| sessions.is_authenticated(token))
        .ok_or(ApiError(ParleyError::Unauthorized))?;
    request.extensions_mut().insert(AgentSession(token));
    Ok(next.run(request).await)
}
