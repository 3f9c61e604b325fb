// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface tests: the full router driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use parley_config::model::{AgentConfig, ResponderConfig};
use parley_core::Responder;
use parley_gateway::{GatewayState, SessionManager, build_router};
use parley_responder::ChatResponder;
use parley_test_utils::{MockReply, MockResponder, TestHarness};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PASSWORD: &str = "correct horse";

struct App {
    router: Router,
    harness: TestHarness,
}

async fn app_with(responder: Option<Arc<dyn Responder>>) -> App {
    let sessions = Arc::new(SessionManager::new(&AgentConfig {
        username: "admin".into(),
        password: Some(PASSWORD.into()),
        display_name: "Support".into(),
        session_ttl_secs: 3600,
    }));
    let mut builder = TestHarness::builder().with_sessions(sessions.clone());
    if let Some(responder) = responder {
        builder = builder.with_responder(responder);
    }
    let harness = builder.build().await.unwrap();
    let state = GatewayState::new(harness.coordinator.clone(), sessions);
    App {
        router: build_router(state, true),
        harness,
    }
}

async fn app() -> App {
    app_with(None).await
}

impl App {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        let mut builder = Request::get(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> Response {
        let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn login(&self) -> String {
        let response = self
            .post(
                "/admin/login",
                json!({"username": "admin", "password": PASSWORD}),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json_body(response).await["token"]
            .as_str()
            .unwrap()
            .to_string()
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read SSE chunks until `needle` shows up; returns everything read.
/// Field separators are compared without the optional space after `:`.
async fn read_until(body: &mut Body, needle: &str) -> String {
    let mut seen = String::new();
    while !seen.replace(": ", ":").contains(needle) {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?}; got {seen:?}"))
            .unwrap_or_else(|| panic!("stream ended before {needle:?}; got {seen:?}"))
            .unwrap();
        if let Ok(data) = frame.into_data() {
            seen.push_str(&String::from_utf8_lossy(&data));
        }
    }
    seen
}

#[tokio::test]
async fn health_is_public() {
    let app = app().await;
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["channels"], 0);
    assert_eq!(body["responder_configured"], false);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn health_reports_failing_store() {
    let app = app().await;
    app.harness.store.fail_writes(true);
    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn standalone_question_gets_an_answer() {
    let responder = Arc::new(MockResponder::with_replies(vec![MockReply::Text(
        "Our SEO plans start at $99.".into(),
    )]));
    let app = app_with(Some(responder.clone())).await;

    let response = app.post("/api/ai", json!({"question": " Pricing? "}), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, json!({"ok": true, "text": "Our SEO plans start at $99."}));
    assert_eq!(responder.prompts().await, ["Pricing?"]);

    let health = json_body(app.get("/health", None).await).await;
    assert_eq!(health["responder_configured"], true);

    let blank = app.post("/api/ai", json!({"question": "   "}), None).await;
    assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(blank).await["code"], "invalid_input");
}

#[tokio::test]
async fn standalone_question_without_responder_is_503() {
    let app = app().await;
    let response = app.post("/api/ai", json!({"question": "hello?"}), None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "responder_unavailable");
}

#[tokio::test]
async fn standalone_question_times_out_with_504() {
    let responder = Arc::new(MockResponder::with_replies(vec![MockReply::Hang]));
    let app = app_with(Some(responder)).await;
    let response = app.post("/api/ai", json!({"question": "hello?"}), None).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json_body(response).await["code"], "timeout");
}

#[tokio::test]
async fn standalone_question_reaches_chat_completions_api() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [{"role": "user", "content": "Do you do Shopify SEO?"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "Yes, we do.\n"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let config = ResponderConfig {
        api_key: Some("sk-test".into()),
        base_url: server.uri(),
        system_prompt: String::new(),
        ..ResponderConfig::default()
    };
    let responder = ChatResponder::from_config(&config).unwrap().unwrap();
    let app = app_with(Some(Arc::new(responder))).await;

    let response = app
        .post("/api/ai", json!({"question": "Do you do Shopify SEO?"}), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["text"], "Yes, we do.");
}

#[tokio::test]
async fn visitor_message_round_trip() {
    let app = app().await;
    let response = app
        .post(
            "/api/client/message",
            json!({"conversation_id": "v1", "text": " Hello ", "client_temp_id": "t-1"}),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["ok"], true);
    let message_id = body["message_id"].as_str().unwrap().to_string();

    let history = json_body(app.get("/api/chat/history/v1?limit=10", None).await).await;
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["id"], message_id.as_str());
    assert_eq!(messages[0]["text"], "Hello");
    assert_eq!(messages[0]["role"], "visitor");

    let presence = json_body(app.get("/api/client/presence/v1", None).await).await;
    assert_eq!(presence["online"], true);
    assert!(presence["last_seen_at"].is_string());
}

#[tokio::test]
async fn invalid_input_is_400_with_error_body() {
    let app = app().await;
    let response = app
        .post(
            "/api/client/message",
            json!({"conversation_id": "v1", "text": "   "}),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["code"], "invalid_input");

    let malformed = app
        .send(
            Request::post("/api/typing")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"conversation_id\": \"v1\", \"who\": \"bot\"}"))
                .unwrap(),
        )
        .await;
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(malformed).await["ok"], false);
}

#[tokio::test]
async fn unknown_presence_is_offline() {
    let app = app().await;
    let body = json_body(app.get("/api/client/presence/nobody", None).await).await;
    assert_eq!(body["conversation_id"], "nobody");
    assert_eq!(body["online"], false);
    assert!(body["last_seen_at"].is_null());
}

#[tokio::test]
async fn agent_routes_require_a_session() {
    let app = app().await;
    for (uri, response) in [
        ("/api/clients", app.get("/api/clients", None).await),
        ("/sse/admin", app.get("/sse/admin", None).await),
        (
            "/api/agent/online",
            app.post("/api/agent/online", json!({"online": true}), Some("forged"))
                .await,
        ),
    ] {
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let bad_login = app
        .post(
            "/admin/login",
            json!({"username": "admin", "password": "nope"}),
            None,
        )
        .await;
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_brings_agent_online_and_logout_takes_it_offline() {
    let app = app().await;
    let response = app
        .post(
            "/admin/login",
            json!({"username": "admin", "password": PASSWORD}),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("parley_session="));
    assert!(cookie.contains("HttpOnly"));
    let token = json_body(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let status = json_body(app.get("/api/status", None).await).await;
    assert_eq!(status["online"], true);
    assert_eq!(status["display_name"], "Support");

    // The cookie alone authenticates too.
    let session_cookie = cookie.split(';').next().unwrap().to_string();
    let clients = app
        .send(
            Request::get("/api/clients")
                .header(header::COOKIE, session_cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(clients.status(), StatusCode::OK);

    let logout = app.post("/admin/logout", json!({}), Some(&token)).await;
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(
        logout.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .contains("Max-Age=0")
    );
    let status = json_body(app.get("/api/status", None).await).await;
    assert_eq!(status["online"], false);
    assert_eq!(
        app.get("/api/clients", Some(&token)).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn agent_conversation_management() {
    let app = app().await;
    let token = app.login().await;

    let missing = app
        .post(
            "/api/agent/message",
            json!({"conversation_id": "ghost", "text": "hi"}),
            Some(&token),
        )
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    app.post("/api/client/heartbeat", json!({"conversation_id": "v1"}), None)
        .await;
    app.post(
        "/api/client/message",
        json!({"conversation_id": "v1", "text": "help"}),
        None,
    )
    .await;

    let clients = json_body(app.get("/api/clients", Some(&token)).await).await;
    assert_eq!(clients["clients"][0]["conversation_id"], "v1");
    assert_eq!(clients["clients"][0]["unread_count"], 1);

    let seen = json_body(
        app.post(
            "/api/seen",
            json!({"conversation_id": "v1", "by": "agent"}),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(seen["message_ids"].as_array().unwrap().len(), 1);

    let reply = app
        .post(
            "/api/agent/message",
            json!({"conversation_id": "v1", "text": "On it"}),
            Some(&token),
        )
        .await;
    assert_eq!(reply.status(), StatusCode::OK);

    let online = json_body(
        app.post("/api/agent/online", json!({"online": false}), Some(&token))
            .await,
    )
    .await;
    assert_eq!(online["ok"], true);
    assert_eq!(online["online"], false);
    assert!(online["last_toggled_at"].is_string());

    let deleted = app
        .send(
            Request::delete("/api/clients/v1")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(deleted.status(), StatusCode::OK);
    let again = app
        .send(
            Request::delete("/api/clients/v1")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn visitor_stream_carries_events_and_ends_on_delete() {
    let responder: Arc<dyn Responder> = Arc::new(MockResponder::with_replies(vec![
        MockReply::Text("An agent will be with you soon.".into()),
    ]));
    let app = app_with(Some(responder)).await;

    let response = app.get("/sse/stream/v1", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()["x-accel-buffering"], "no");
    let mut body = response.into_body();
    read_until(&mut body, "retry:1000").await;

    let presence = app.harness.coordinator.client_presence("v1").await.unwrap();
    assert!(presence.unwrap().online);

    app.post(
        "/api/client/message",
        json!({"conversation_id": "v1", "text": "Hello"}),
        None,
    )
    .await;
    let chunk = read_until(&mut body, "event:message").await;
    assert!(chunk.contains("An agent will be with you soon."), "{chunk}");
    assert!(chunk.contains("emitted_at"));

    app.post(
        "/api/typing",
        json!({"conversation_id": "v1", "who": "agent", "state": true}),
        None,
    )
    .await;
    read_until(&mut body, "event:typing").await;

    app.harness
        .coordinator
        .delete_conversation(&app.harness_token().await, "v1")
        .await
        .unwrap();
    read_until(&mut body, "event:deleted").await;
    let end = tokio::time::timeout(Duration::from_secs(2), body.frame())
        .await
        .unwrap();
    assert!(end.is_none(), "stream must end after deleted");
}

#[tokio::test]
async fn closing_last_visitor_stream_marks_offline() {
    let app = app().await;
    let response = app.get("/sse/stream/v1", None).await;
    let mut body = response.into_body();
    read_until(&mut body, "retry:").await;
    assert!(
        app.harness
            .coordinator
            .client_presence("v1")
            .await
            .unwrap()
            .unwrap()
            .online
    );

    drop(body);
    let mut online = true;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        online = app
            .harness
            .coordinator
            .client_presence("v1")
            .await
            .unwrap()
            .unwrap()
            .online;
        if !online {
            break;
        }
    }
    assert!(!online, "visitor should be offline after the stream closed");
}

#[tokio::test]
async fn admin_stream_sees_visitor_activity() {
    let app = app().await;
    let token = app.login().await;
    let response = app.get("/sse/admin", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let mut body = response.into_body();
    read_until(&mut body, "retry:").await;

    app.post(
        "/api/client/message",
        json!({"conversation_id": "v9", "text": "ping?"}),
        None,
    )
    .await;
    let chunk = read_until(&mut body, "event:clients_list_changed").await;
    assert!(chunk.replace(": ", ":").contains("event:message"));
    assert!(chunk.contains("ping?"));
}

impl App {
    /// Session for direct coordinator calls in stream tests.
    async fn harness_token(&self) -> parley_core::SessionToken {
        parley_core::SessionToken::new(self.login().await)
    }
}
