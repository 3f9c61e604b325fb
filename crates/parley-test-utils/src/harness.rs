// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a complete relay (temp SQLite store behind a
//! [`FlakyStore`], live event hub, coordinator) and offers helpers to watch
//! channels the way a connected client would.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parley_config::model::StorageConfig;
use parley_core::{
    ChannelKey, ConversationId, HubEvent, ParleyError, Responder, SessionAuthority, SessionToken,
};
use parley_hub::{EventHub, Frame, FrameStream, HubSettings};
use parley_relay::{Coordinator, RelaySettings};
use parley_storage::SqliteStore;

use crate::flaky_store::FlakyStore;

/// Token accepted by the default [`StaticSessions`].
pub const TEST_AGENT_TOKEN: &str = "test-agent-token";

/// Session authority that accepts a fixed set of tokens.
pub struct StaticSessions {
    tokens: HashSet<String>,
}

impl StaticSessions {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }
}

impl SessionAuthority for StaticSessions {
    fn is_authenticated(&self, token: &SessionToken) -> bool {
        self.tokens.contains(token.expose())
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responder: Option<Arc<dyn Responder>>,
    sessions: Option<Arc<dyn SessionAuthority>>,
    hub: HubSettings,
    relay: RelaySettings,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responder: None,
            sessions: None,
            hub: HubSettings {
                keepalive: Duration::from_secs(60),
                retry: Duration::from_millis(1000),
                queue_capacity: 64,
            },
            relay: RelaySettings {
                responder_timeout: Duration::from_secs(2),
                history_default_limit: 50,
                history_max_limit: 200,
                agent_display_name: "Support".to_string(),
            },
        }
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    /// Replace the default [`StaticSessions`] authority.
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionAuthority>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_hub_settings(mut self, settings: HubSettings) -> Self {
        self.hub = settings;
        self
    }

    pub fn with_relay_settings(mut self, settings: RelaySettings) -> Self {
        self.relay = settings;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, ParleyError> {
        let temp_dir = tempfile::TempDir::new().map_err(ParleyError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let sqlite = Arc::new(SqliteStore::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        }));
        sqlite.initialize().await?;
        let store = Arc::new(FlakyStore::new(sqlite));

        let hub = EventHub::new(self.hub);
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(StaticSessions::new([TEST_AGENT_TOKEN])));
        let mut coordinator = Coordinator::new(
            store.clone(),
            store.clone(),
            hub.clone(),
            sessions,
            self.relay,
        );
        if let Some(responder) = self.responder {
            coordinator = coordinator.with_responder(responder);
        }

        Ok(TestHarness {
            coordinator: Arc::new(coordinator),
            hub,
            store,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete relay over a temp database.
pub struct TestHarness {
    pub coordinator: Arc<Coordinator>,
    pub hub: EventHub,
    /// The store behind the coordinator; switch its writes off to inject failures.
    pub store: Arc<FlakyStore>,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Token accepted by the default session authority.
    pub fn agent_token(&self) -> SessionToken {
        SessionToken::new(TEST_AGENT_TOKEN)
    }

    /// Subscribe to a visitor's channel, consuming the priming retry frame.
    pub async fn watch_conversation(&self, conversation_id: &str) -> FrameStream {
        let id = ConversationId::parse(conversation_id).unwrap_or_else(|e| panic!("{e}"));
        watch(&self.hub, ChannelKey::conversation(&id)).await
    }

    /// Subscribe to the agent console, consuming the priming retry frame.
    pub async fn watch_console(&self) -> FrameStream {
        watch(&self.hub, ChannelKey::AgentConsole).await
    }
}

async fn watch(hub: &EventHub, channel: ChannelKey) -> FrameStream {
    let (_handle, mut stream) = hub.subscribe(channel);
    match stream.next().await {
        Some(Frame::Retry(_)) => stream,
        other => panic!("expected a retry frame first, got {other:?}"),
    }
}

/// Next published event, skipping heartbeats. Panics after one second.
pub async fn next_event(stream: &mut FrameStream) -> Arc<HubEvent> {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for an event"));
        match frame {
            Some(Frame::Event(event)) => return event,
            Some(_) => continue,
            None => panic!("stream ended while waiting for an event"),
        }
    }
}

/// Asserts nothing but heartbeats arrives for 100 ms.
pub async fn assert_quiet(stream: &mut FrameStream) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(100);
    loop {
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Err(_) => return,
            Ok(Some(Frame::Heartbeat)) => continue,
            Ok(other) => panic!("expected no events, got {other:?}"),
        }
    }
}
