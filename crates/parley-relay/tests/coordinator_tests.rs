// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinator behaviour against a real SQLite store and a live hub.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_config::model::StorageConfig;
use parley_core::{
    ChannelKey, ConversationId, HubEvent, HubEventKind, MessageId, ParleyError, Party, Responder,
    Role, SessionAuthority, SessionToken,
};
use parley_hub::{EventHub, Frame, FrameStream};
use parley_relay::{Coordinator, RelaySettings};
use parley_storage::SqliteStore;
use tempfile::TempDir;
use tokio::sync::Notify;

const AGENT_TOKEN: &str = "agent-token";

struct FixedSession;

impl SessionAuthority for FixedSession {
    fn is_authenticated(&self, token: &SessionToken) -> bool {
        token.expose() == AGENT_TOKEN
    }
}

enum Script {
    Reply(&'static str),
    Fail,
    Hang,
    /// Reply once the gate is opened.
    Gated(Arc<Notify>, &'static str),
}

struct ScriptedResponder {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedResponder {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Responder for ScriptedResponder {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_reply(&self, _text: &str) -> Result<String, ParleyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Reply(text) => Ok(text.to_string()),
            Script::Fail => Err(ParleyError::ResponderUnavailable {
                message: "upstream 500".into(),
                source: None,
            }),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("too late".into())
            }
            Script::Gated(gate, text) => {
                gate.notified().await;
                Ok(text.to_string())
            }
        }
    }
}

struct Fixture {
    coordinator: Coordinator,
    hub: EventHub,
    _dir: TempDir,
}

async fn fixture(responder: Option<Arc<ScriptedResponder>>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(StorageConfig {
        database_path: dir.path().join("relay.db").to_str().unwrap().to_string(),
        wal_mode: true,
    }));
    store.initialize().await.unwrap();

    let hub = EventHub::default();
    let settings = RelaySettings {
        responder_timeout: Duration::from_secs(2),
        history_default_limit: 50,
        history_max_limit: 100,
        agent_display_name: "Support".into(),
    };
    let mut coordinator = Coordinator::new(
        store.clone(),
        store,
        hub.clone(),
        Arc::new(FixedSession),
        settings,
    );
    if let Some(responder) = responder {
        coordinator = coordinator.with_responder(responder);
    }
    Fixture {
        coordinator,
        hub,
        _dir: dir,
    }
}

fn agent() -> SessionToken {
    SessionToken::new(AGENT_TOKEN)
}

fn visitor_channel(raw: &str) -> ChannelKey {
    ChannelKey::conversation(&ConversationId::parse(raw).unwrap())
}

async fn open(hub: &EventHub, channel: ChannelKey) -> FrameStream {
    let (_handle, mut stream) = hub.subscribe(channel);
    assert!(matches!(stream.next().await, Some(Frame::Retry(_))));
    stream
}

/// Next published event, skipping heartbeats. Panics after one second.
async fn next_event(stream: &mut FrameStream) -> Arc<HubEvent> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended");
        if let Frame::Event(event) = frame {
            return event;
        }
    }
}

async fn assert_quiet(stream: &mut FrameStream) {
    let frame = tokio::time::timeout(Duration::from_millis(100), stream.next()).await;
    if let Ok(Some(Frame::Event(event))) = frame {
        panic!("unexpected event {}", event.name());
    }
}

fn message_role(event: &HubEvent) -> Role {
    match &event.kind {
        HubEventKind::Message(payload) => payload.message.role,
        other => panic!("expected message, got {}", other.name()),
    }
}

#[tokio::test]
async fn offline_agent_gets_one_bot_reply() {
    let responder = ScriptedResponder::new(Script::Reply("We will get back to you."));
    let fx = fixture(Some(responder.clone())).await;
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "Hello", Some("tmp-1".into()))
        .await
        .unwrap();
    assert!(submitted.message_id.as_str().starts_with("v_"));
    let bot = submitted.reply.expect("reply requested").await.unwrap().expect("bot message");
    assert_eq!(bot.role, Role::Bot);
    assert_eq!(bot.text, "We will get back to you.");
    assert_eq!(responder.calls.load(Ordering::SeqCst), 1);

    let first = next_event(&mut console).await;
    match &first.kind {
        HubEventKind::Message(payload) => {
            assert_eq!(payload.message.role, Role::Visitor);
            assert_eq!(payload.message.text, "Hello");
            assert_eq!(payload.client_temp_id.as_deref(), Some("tmp-1"));
        }
        other => panic!("expected message, got {}", other.name()),
    }
    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");
    assert_eq!(message_role(&*next_event(&mut console).await), Role::Bot);
    assert_quiet(&mut console).await;

    assert_eq!(message_role(&*next_event(&mut visitor).await), Role::Bot);
    assert_quiet(&mut visitor).await;

    let history = fx.coordinator.history("v1", None).await.unwrap();
    let roles: Vec<_> = history.iter().map(|m| m.role).collect();
    assert_eq!(roles, [Role::Visitor, Role::Bot]);
    assert_eq!(history[0].text, "Hello");
}

#[tokio::test]
async fn online_agent_suppresses_bot_reply() {
    let responder = ScriptedResponder::new(Script::Reply("bot"));
    let fx = fixture(Some(responder.clone())).await;
    fx.coordinator.set_agent_presence(&agent(), true).await.unwrap();

    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "anyone there?", None)
        .await
        .unwrap();
    assert!(submitted.reply.is_none());
    assert_eq!(responder.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fx.coordinator.history("v1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn responder_failure_stores_no_bot_message() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Fail))).await;
    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "hi", None)
        .await
        .unwrap();
    assert!(submitted.reply.unwrap().await.unwrap().is_none());
    assert_eq!(fx.coordinator.history("v1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn blank_reply_stores_no_bot_message() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Reply("   ")))).await;
    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "hi", None)
        .await
        .unwrap();
    assert!(submitted.reply.unwrap().await.unwrap().is_none());
    assert_eq!(fx.coordinator.history("v1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn hanging_responder_times_out_without_blocking_others() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Hang))).await;
    let started = tokio::time::Instant::now();
    let first = fx
        .coordinator
        .submit_visitor_message("v1", "hi", None)
        .await
        .unwrap();
    let second = fx
        .coordinator
        .submit_visitor_message("v2", "hello", None)
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(first.reply.unwrap().await.unwrap().is_none());
    assert!(second.reply.unwrap().await.unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(fx.coordinator.history("v1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_visitor_input_is_rejected_before_storing() {
    let fx = fixture(None).await;
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    for (cid, text) in [("", "hi"), ("v1", "   "), ("  ", "")] {
        let err = fx
            .coordinator
            .submit_visitor_message(cid, text, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ParleyError::InvalidInput(_)));
    }
    assert_quiet(&mut console).await;
    assert!(fx.coordinator.client_presence("v1").await.unwrap().is_none());
}

#[tokio::test]
async fn agent_actions_require_a_session() {
    let fx = fixture(None).await;
    fx.coordinator.submit_visitor_message("v1", "hi", None).await.unwrap();
    let stranger = SessionToken::new("nope");

    assert!(matches!(
        fx.coordinator.submit_agent_message(&stranger, "v1", "hello").await,
        Err(ParleyError::Unauthorized)
    ));
    assert!(matches!(
        fx.coordinator.set_agent_presence(&stranger, true).await,
        Err(ParleyError::Unauthorized)
    ));
    assert!(matches!(
        fx.coordinator.delete_conversation(&stranger, "v1").await,
        Err(ParleyError::Unauthorized)
    ));
    assert!(matches!(
        fx.coordinator.conversation_summaries(&stranger).await,
        Err(ParleyError::Unauthorized)
    ));
    assert_eq!(fx.coordinator.history("v1", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn agent_message_reaches_visitor_and_console() {
    let fx = fixture(None).await;
    fx.coordinator.submit_visitor_message("v1", "hi", None).await.unwrap();
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    let id = fx
        .coordinator
        .submit_agent_message(&agent(), "v1", " How can I help? ")
        .await
        .unwrap();
    assert!(id.as_str().starts_with("a_"));

    let seen_by_visitor = next_event(&mut visitor).await;
    match &seen_by_visitor.kind {
        HubEventKind::Message(payload) => {
            assert_eq!(payload.message.id, id);
            assert_eq!(payload.message.text, "How can I help?");
        }
        other => panic!("expected message, got {}", other.name()),
    }
    assert_eq!(message_role(&*next_event(&mut console).await), Role::Agent);
    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");
}

#[tokio::test]
async fn agent_message_to_unknown_conversation_is_not_found() {
    let fx = fixture(None).await;
    let err = fx
        .coordinator
        .submit_agent_message(&agent(), "ghost", "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, ParleyError::NotFound { conversation_id } if conversation_id == "ghost"));
    assert!(fx.coordinator.history("ghost", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn typing_goes_to_the_other_party() {
    let fx = fixture(None).await;
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    fx.coordinator.set_typing("v1", Party::Agent, true).unwrap();
    fx.coordinator.set_typing("v1", Party::Visitor, false).unwrap();

    match &next_event(&mut visitor).await.kind {
        HubEventKind::Typing(t) => assert!(t.who == Party::Agent && t.state),
        other => panic!("expected typing, got {}", other.name()),
    }
    match &next_event(&mut console).await.kind {
        HubEventKind::Typing(t) => assert!(t.who == Party::Visitor && !t.state),
        other => panic!("expected typing, got {}", other.name()),
    }
    assert_quiet(&mut visitor).await;
    assert!(fx.coordinator.set_typing(" ", Party::Agent, true).is_err());
}

#[tokio::test]
async fn mark_seen_is_idempotent_but_always_notifies() {
    let fx = fixture(None).await;
    let first = fx.coordinator.submit_visitor_message("v1", "one", None).await.unwrap();
    let second = fx.coordinator.submit_visitor_message("v1", "two", None).await.unwrap();
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    let ids = vec![first.message_id.clone(), second.message_id.clone()];
    for _ in 0..2 {
        let marked = fx
            .coordinator
            .mark_seen("v1", Party::Agent, Some(ids.clone()))
            .await
            .unwrap();
        assert_eq!(marked, ids);
        match &next_event(&mut visitor).await.kind {
            HubEventKind::Seen(seen) => {
                assert_eq!(seen.by, Party::Agent);
                assert_eq!(seen.message_ids, ids);
            }
            other => panic!("expected seen, got {}", other.name()),
        }
    }

    let history = fx.coordinator.history("v1", None).await.unwrap();
    assert!(history.iter().all(|m| m.seen_by_agent && !m.seen_by_client));
}

#[tokio::test]
async fn mark_seen_without_ids_acknowledges_the_unseen_set() {
    let fx = fixture(None).await;
    let visitor_msg = fx.coordinator.submit_visitor_message("v1", "hi", None).await.unwrap();
    let agent_msg = fx
        .coordinator
        .submit_agent_message(&agent(), "v1", "hello")
        .await
        .unwrap();
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;

    let marked = fx.coordinator.mark_seen("v1", Party::Visitor, None).await.unwrap();
    assert_eq!(marked, vec![agent_msg]);
    match &next_event(&mut console).await.kind {
        HubEventKind::Seen(seen) => assert_eq!(seen.by, Party::Visitor),
        other => panic!("expected seen, got {}", other.name()),
    }

    // Own messages and foreign ids are filtered out.
    let marked = fx
        .coordinator
        .mark_seen(
            "v1",
            Party::Visitor,
            Some(vec![visitor_msg.message_id, MessageId("a_000000000000".into())]),
        )
        .await
        .unwrap();
    assert!(marked.is_empty());
    assert!(fx.coordinator.mark_seen("v1", Party::Visitor, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn presence_toggles_fan_out_with_increasing_timestamps() {
    let fx = fixture(None).await;
    for cid in ["v1", "v2"] {
        fx.coordinator.heartbeat(cid).await.unwrap();
    }
    let mut streams = vec![
        open(&fx.hub, ChannelKey::AgentConsole).await,
        open(&fx.hub, visitor_channel("v1")).await,
        open(&fx.hub, visitor_channel("v2")).await,
    ];

    let on = fx.coordinator.set_agent_presence(&agent(), true).await.unwrap();
    let off = fx.coordinator.set_agent_presence(&agent(), false).await.unwrap();
    assert!(on.last_toggled_at < off.last_toggled_at);
    assert_eq!(on.display_name, "Support");

    for stream in &mut streams {
        let mut seen = Vec::new();
        for _ in 0..2 {
            match &next_event(stream).await.kind {
                HubEventKind::AgentStatus(status) => seen.push(status.clone()),
                other => panic!("expected agent_status, got {}", other.name()),
            }
        }
        assert!(seen[0].online && !seen[1].online);
        assert!(seen[0].last_toggled_at < seen[1].last_toggled_at);
    }

    let stored = fx.coordinator.agent_presence().await.unwrap();
    assert_eq!(stored, off);
}

#[tokio::test]
async fn delete_clears_history_and_notifies_visitor() {
    let fx = fixture(None).await;
    fx.coordinator.submit_visitor_message("v1", "bye", None).await.unwrap();
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    fx.coordinator.delete_conversation(&agent(), "v1").await.unwrap();

    assert!(fx.coordinator.history("v1", None).await.unwrap().is_empty());
    assert!(fx.coordinator.client_presence("v1").await.unwrap().is_none());
    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");
    let terminal = next_event(&mut visitor).await;
    assert!(terminal.kind.is_terminal());

    let again = fx.coordinator.delete_conversation(&agent(), "v1").await;
    assert!(matches!(again, Err(ParleyError::NotFound { .. })));
}

#[tokio::test]
async fn delete_during_pending_reply_discards_the_reply() {
    let gate = Arc::new(Notify::new());
    let responder = ScriptedResponder::new(Script::Gated(Arc::clone(&gate), "bot says hi"));
    let fx = fixture(Some(responder.clone())).await;

    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "Hello", None)
        .await
        .unwrap();
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    let mut visitor = open(&fx.hub, visitor_channel("v1")).await;

    fx.coordinator.delete_conversation(&agent(), "v1").await.unwrap();
    gate.notify_one();

    assert!(submitted.reply.unwrap().await.unwrap().is_none());
    assert_eq!(responder.calls.load(Ordering::SeqCst), 1);
    assert!(fx.coordinator.history("v1", None).await.unwrap().is_empty());
    assert!(fx.coordinator.client_presence("v1").await.unwrap().is_none());

    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");
    assert_quiet(&mut console).await;
    assert!(next_event(&mut visitor).await.kind.is_terminal());
    assert_quiet(&mut visitor).await;

    let again = fx.coordinator.delete_conversation(&agent(), "v1").await;
    assert!(matches!(again, Err(ParleyError::NotFound { .. })));
}

#[tokio::test]
async fn reply_stored_before_delete_is_removed_with_the_conversation() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Reply("bot says hi")))).await;
    let submitted = fx
        .coordinator
        .submit_visitor_message("v1", "Hello", None)
        .await
        .unwrap();
    assert!(submitted.reply.unwrap().await.unwrap().is_some());

    fx.coordinator.delete_conversation(&agent(), "v1").await.unwrap();
    assert!(fx.coordinator.history("v1", None).await.unwrap().is_empty());
    let late = fx
        .coordinator
        .submit_agent_message(&agent(), "v1", "still there?")
        .await;
    assert!(matches!(late, Err(ParleyError::NotFound { .. })));
    assert!(fx.coordinator.history("v1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn standalone_question_is_answered_without_side_effects() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Reply("  SEO starts at $99. ")))).await;
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;

    let answer = fx.coordinator.ask_responder(" What does SEO cost? ").await.unwrap();
    assert_eq!(answer, "SEO starts at $99.");
    assert_quiet(&mut console).await;
    assert!(fx.coordinator.conversation_summaries(&agent()).await.unwrap().is_empty());

    let blank = fx.coordinator.ask_responder("   ").await;
    assert!(matches!(blank, Err(ParleyError::InvalidInput(_))));
}

#[tokio::test]
async fn standalone_question_needs_a_responder() {
    let fx = fixture(None).await;
    let err = fx.coordinator.ask_responder("hello?").await.unwrap_err();
    assert!(matches!(err, ParleyError::ResponderUnavailable { .. }));
}

#[tokio::test]
async fn standalone_question_times_out() {
    let fx = fixture(Some(ScriptedResponder::new(Script::Hang))).await;
    let err = fx.coordinator.ask_responder("hello?").await.unwrap_err();
    assert!(matches!(
        err,
        ParleyError::Timeout { duration } if duration == Duration::from_secs(2)
    ));
}

#[tokio::test]
async fn heartbeat_announces_new_conversations_only() {
    let fx = fixture(None).await;
    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;

    let presence = fx.coordinator.heartbeat("v9").await.unwrap();
    assert!(presence.online);
    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");

    fx.coordinator.heartbeat("v9").await.unwrap();
    assert_quiet(&mut console).await;
}

#[tokio::test]
async fn last_visitor_stream_closing_marks_offline() {
    let fx = fixture(None).await;
    let cid = ConversationId::parse("v1").unwrap();
    let first = open(&fx.hub, visitor_channel("v1")).await;
    let second = open(&fx.hub, visitor_channel("v1")).await;
    fx.coordinator.visitor_connected(&cid).await.unwrap();
    assert!(fx.coordinator.client_presence("v1").await.unwrap().unwrap().online);

    drop(first);
    fx.coordinator.visitor_disconnected(&cid).await.unwrap();
    assert!(fx.coordinator.client_presence("v1").await.unwrap().unwrap().online);

    let mut console = open(&fx.hub, ChannelKey::AgentConsole).await;
    drop(second);
    fx.coordinator.visitor_disconnected(&cid).await.unwrap();
    assert!(!fx.coordinator.client_presence("v1").await.unwrap().unwrap().online);
    assert_eq!(next_event(&mut console).await.name(), "clients_list_changed");
}

#[tokio::test]
async fn summaries_and_history_limits() {
    let fx = fixture(None).await;
    for i in 0..5 {
        fx.coordinator
            .submit_visitor_message("v1", &format!("m{i}"), None)
            .await
            .unwrap();
    }
    fx.coordinator.heartbeat("v2").await.unwrap();

    let summaries = fx.coordinator.conversation_summaries(&agent()).await.unwrap();
    assert_eq!(summaries.len(), 2);
    let v1 = summaries.iter().find(|s| s.conversation_id.as_str() == "v1").unwrap();
    assert_eq!(v1.unread_count, 5);

    let window = fx.coordinator.history("v1", Some(2)).await.unwrap();
    let texts: Vec<_> = window.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, ["m3", "m4"]);
    assert_eq!(fx.coordinator.history("v1", Some(0)).await.unwrap().len(), 1);
    assert_eq!(fx.coordinator.history("v1", Some(10_000)).await.unwrap().len(), 5);
}

#[tokio::test]
async fn restart_reset_takes_agent_offline() {
    let fx = fixture(None).await;
    fx.coordinator.set_agent_presence(&agent(), true).await.unwrap();
    fx.coordinator.reset_agent_presence().await.unwrap();
    assert!(!fx.coordinator.agent_presence().await.unwrap().online);
}
