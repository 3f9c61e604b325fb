// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery-state coordinator.
//!
//! Every action validates its input, commits to the stores, and only then
//! publishes. A store failure aborts the action before anything is published;
//! publishing itself never fails an action.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parley_core::events::{
    AgentStatusPayload, ConversationRef, MessagePayload, SeenPayload, TypingPayload,
};
use parley_core::{
    AgentPresence, ChannelKey, ClientPresence, ConversationId, ConversationSummary, HealthStatus,
    HubEvent, HubEventKind, Message, MessageId, MessageStore, ParleyError, Party, PresenceStore, Responder,
    Role, SessionAuthority, SessionToken,
};
use parley_hub::EventHub;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::RelaySettings;
use crate::reply::{AutoReply, generate_reply};

/// Outcome of a visitor message.
#[derive(Debug)]
pub struct VisitorSubmission {
    pub message_id: MessageId,
    /// Pending automated reply, when one was requested. Dropping the handle
    /// does not cancel the reply.
    pub reply: Option<JoinHandle<Option<Message>>>,
}

/// Coordinates stores, the event hub, and the automated responder.
pub struct Coordinator {
    messages: Arc<dyn MessageStore>,
    presence: Arc<dyn PresenceStore>,
    hub: EventHub,
    responder: Option<Arc<dyn Responder>>,
    sessions: Arc<dyn SessionAuthority>,
    settings: RelaySettings,
    /// Serializes agent presence toggles so timestamps stay strictly increasing.
    toggle: Mutex<()>,
    /// Shared while messages are stored and published, exclusive while a
    /// conversation is deleted. No event follows a `deleted` event.
    lifecycle: Arc<RwLock<()>>,
}

impl Coordinator {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        presence: Arc<dyn PresenceStore>,
        hub: EventHub,
        sessions: Arc<dyn SessionAuthority>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            messages,
            presence,
            hub,
            responder: None,
            sessions,
            settings,
            toggle: Mutex::new(()),
            lifecycle: Arc::new(RwLock::new(())),
        }
    }

    /// Enable automated replies while the agent is offline.
    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn has_responder(&self) -> bool {
        self.responder.is_some()
    }

    fn authorize(&self, session: &SessionToken) -> Result<(), ParleyError> {
        if self.sessions.is_authenticated(session) {
            Ok(())
        } else {
            Err(ParleyError::Unauthorized)
        }
    }

    fn publish(&self, channel: &ChannelKey, kind: HubEventKind) {
        let delivered = self.hub.publish(channel, HubEvent::now(kind));
        debug!(%channel, delivered, "event published");
    }

    fn publish_list_changed(&self, conversation_id: &ConversationId) {
        self.publish(
            &ChannelKey::AgentConsole,
            HubEventKind::ClientsListChanged(ConversationRef {
                conversation_id: conversation_id.clone(),
            }),
        );
    }

    /// A visitor sent `text`.
    ///
    /// Publishes the message and a list refresh to the agent console. When
    /// the agent is offline and a responder is configured, an automated reply
    /// is started in the background.
    pub async fn submit_visitor_message(
        &self,
        conversation_id: &str,
        text: &str,
        client_temp_id: Option<String>,
    ) -> Result<VisitorSubmission, ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        let text = required_text(text)?;
        let client_temp_id = client_temp_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let guard = self.lifecycle.read().await;
        let now = crate::now();
        self.presence.touch_client(&conversation_id, true, now).await?;
        let message = Message::new(conversation_id.clone(), Role::Visitor, text, now);
        self.messages.append_message(&message).await?;
        info!(%conversation_id, message_id = %message.id, "visitor message stored");

        let message_id = message.id.clone();
        self.publish(
            &ChannelKey::AgentConsole,
            HubEventKind::Message(MessagePayload {
                message,
                client_temp_id,
            }),
        );
        self.publish_list_changed(&conversation_id);
        drop(guard);

        let reply = match self.responder.as_ref() {
            Some(responder) => self.start_reply(responder, &conversation_id, text).await,
            None => None,
        };
        Ok(VisitorSubmission { message_id, reply })
    }

    async fn start_reply(
        &self,
        responder: &Arc<dyn Responder>,
        conversation_id: &ConversationId,
        text: &str,
    ) -> Option<JoinHandle<Option<Message>>> {
        match self.presence.agent_presence().await {
            Ok(agent) if agent.online => {
                debug!(%conversation_id, "agent online, no automated reply");
                None
            }
            Ok(_) => {
                let task = AutoReply {
                    responder: Arc::clone(responder),
                    messages: Arc::clone(&self.messages),
                    hub: self.hub.clone(),
                    timeout: self.settings.responder_timeout,
                    lifecycle: Arc::clone(&self.lifecycle),
                };
                Some(task.spawn(conversation_id.clone(), text.to_string()))
            }
            Err(err) => {
                warn!(
                    %conversation_id,
                    error = %err,
                    "agent presence unknown, skipping automated reply"
                );
                None
            }
        }
    }

    /// The agent replied in a conversation.
    pub async fn submit_agent_message(
        &self,
        session: &SessionToken,
        conversation_id: &str,
        text: &str,
    ) -> Result<MessageId, ParleyError> {
        self.authorize(session)?;
        let conversation_id = ConversationId::parse(conversation_id)?;
        let text = required_text(text)?;

        let _guard = self.lifecycle.read().await;
        let message = Message::new(conversation_id.clone(), Role::Agent, text, crate::now());
        if !self.messages.append_if_active(&message).await? {
            return Err(ParleyError::NotFound {
                conversation_id: conversation_id.to_string(),
            });
        }
        info!(%conversation_id, message_id = %message.id, "agent message stored");

        let message_id = message.id.clone();
        let event = HubEventKind::Message(MessagePayload {
            message,
            client_temp_id: None,
        });
        self.publish(&ChannelKey::conversation(&conversation_id), event.clone());
        self.publish(&ChannelKey::AgentConsole, event);
        self.publish_list_changed(&conversation_id);
        Ok(message_id)
    }

    /// Forward a typing indicator to the other party. Nothing is stored.
    pub fn set_typing(
        &self,
        conversation_id: &str,
        who: Party,
        state: bool,
    ) -> Result<(), ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        let channel = match who {
            Party::Agent => ChannelKey::conversation(&conversation_id),
            Party::Visitor => ChannelKey::AgentConsole,
        };
        self.publish(
            &channel,
            HubEventKind::Typing(TypingPayload {
                conversation_id,
                who,
                state,
            }),
        );
        Ok(())
    }

    /// `by` has seen messages from the other party.
    ///
    /// Without explicit ids (or with an empty list) every message still
    /// unseen by `by` is acknowledged. A `seen` event goes to the other party
    /// on every call, even when nothing changed.
    pub async fn mark_seen(
        &self,
        conversation_id: &str,
        by: Party,
        message_ids: Option<Vec<MessageId>>,
    ) -> Result<Vec<MessageId>, ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        let requested = match message_ids.filter(|ids| !ids.is_empty()) {
            Some(ids) => ids,
            None => self.messages.unseen_message_ids(&conversation_id, by).await?,
        };
        let marked = self
            .messages
            .mark_seen(&conversation_id, by, &requested)
            .await?;
        debug!(%conversation_id, %by, count = marked.len(), "messages marked seen");

        let channel = match by {
            Party::Agent => ChannelKey::conversation(&conversation_id),
            Party::Visitor => ChannelKey::AgentConsole,
        };
        self.publish(
            &channel,
            HubEventKind::Seen(SeenPayload {
                conversation_id,
                by,
                message_ids: marked.clone(),
            }),
        );
        Ok(marked)
    }

    /// Toggle the agent online or offline and tell every party.
    ///
    /// `agent_status` is published to the agent console and to each known
    /// conversation, so the fan-out grows with the number of conversations.
    pub async fn set_agent_presence(
        &self,
        session: &SessionToken,
        online: bool,
    ) -> Result<AgentPresence, ParleyError> {
        self.authorize(session)?;
        let presence = self.store_agent_presence(online).await?;
        info!(online, "agent presence changed");
        self.broadcast_agent_status(&presence).await;
        Ok(presence)
    }

    async fn store_agent_presence(&self, online: bool) -> Result<AgentPresence, ParleyError> {
        let _guard = self.toggle.lock().await;
        let previous = self.presence.agent_presence().await?;
        let presence = AgentPresence {
            online,
            display_name: self.settings.agent_display_name.clone(),
            last_toggled_at: Some(next_toggle_time(
                previous.last_toggled_at,
                crate::now(),
            )),
        };
        self.presence.set_agent_presence(&presence).await?;
        Ok(presence)
    }

    async fn broadcast_agent_status(&self, presence: &AgentPresence) {
        let kind = HubEventKind::AgentStatus(AgentStatusPayload::from(presence));
        self.publish(&ChannelKey::AgentConsole, kind.clone());
        match self.presence.conversation_ids().await {
            Ok(ids) => {
                for conversation_id in &ids {
                    self.publish(&ChannelKey::conversation(conversation_id), kind.clone());
                }
            }
            // The toggle is committed; visitors will pick it up from /api/status.
            Err(err) => warn!(error = %err, "could not list conversations for agent status"),
        }
    }

    /// Mark the agent offline after a restart, when no session can have survived.
    pub async fn reset_agent_presence(&self) -> Result<(), ParleyError> {
        let current = self.presence.agent_presence().await?;
        if current.online || current.display_name != self.settings.agent_display_name {
            let presence = self.store_agent_presence(false).await?;
            self.broadcast_agent_status(&presence).await;
            info!("agent presence reset to offline");
        }
        Ok(())
    }

    /// Remove a conversation and everything stored for it.
    ///
    /// A connected visitor receives a terminal `deleted` event.
    pub async fn delete_conversation(
        &self,
        session: &SessionToken,
        conversation_id: &str,
    ) -> Result<(), ParleyError> {
        self.authorize(session)?;
        let conversation_id = ConversationId::parse(conversation_id)?;

        let _guard = self.lifecycle.write().await;
        if !self.presence.remove_client(&conversation_id).await? {
            return Err(ParleyError::NotFound {
                conversation_id: conversation_id.to_string(),
            });
        }
        // The client row goes first: from here on conditional appends are refused.
        let removed = self.messages.delete_messages(&conversation_id).await?;
        info!(%conversation_id, removed, "conversation deleted");

        self.publish_list_changed(&conversation_id);
        self.publish(
            &ChannelKey::conversation(&conversation_id),
            HubEventKind::Deleted(ConversationRef {
                conversation_id: conversation_id.clone(),
            }),
        );
        Ok(())
    }

    /// Periodic visitor keep-alive.
    pub async fn heartbeat(&self, conversation_id: &str) -> Result<ClientPresence, ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        let touch = self
            .presence
            .touch_client(&conversation_id, true, crate::now())
            .await?;
        if touch.created {
            self.publish_list_changed(&conversation_id);
        }
        Ok(touch.presence)
    }

    /// A visitor stream opened.
    pub async fn visitor_connected(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), ParleyError> {
        let was_online = self
            .presence
            .client_presence(conversation_id)
            .await?
            .is_some_and(|p| p.online);
        self.presence
            .touch_client(conversation_id, true, crate::now())
            .await?;
        if !was_online {
            self.publish_list_changed(conversation_id);
        }
        debug!(%conversation_id, "visitor connected");
        Ok(())
    }

    /// A visitor stream closed. Once the conversation has no live stream the
    /// visitor is marked offline.
    pub async fn visitor_disconnected(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<(), ParleyError> {
        if self.hub.subscriber_count(&ChannelKey::conversation(conversation_id)) > 0 {
            return Ok(());
        }
        // A deleted conversation must not be resurrected by its closing stream.
        if self.presence.client_presence(conversation_id).await?.is_none() {
            return Ok(());
        }
        self.presence
            .touch_client(conversation_id, false, crate::now())
            .await?;
        self.publish_list_changed(conversation_id);
        debug!(%conversation_id, "visitor offline");
        Ok(())
    }

    /// Answer a standalone question with the configured responder.
    ///
    /// Nothing is stored or published.
    pub async fn ask_responder(&self, question: &str) -> Result<String, ParleyError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ParleyError::invalid("question must not be empty"));
        }
        let responder =
            self.responder
                .as_ref()
                .ok_or_else(|| ParleyError::ResponderUnavailable {
                    message: "no responder configured".to_string(),
                    source: None,
                })?;
        generate_reply(responder.as_ref(), self.settings.responder_timeout, question).await
    }

    /// Health of the message store.
    pub async fn health(&self) -> Result<HealthStatus, ParleyError> {
        self.messages.health_check().await
    }

    pub async fn agent_presence(&self) -> Result<AgentPresence, ParleyError> {
        self.presence.agent_presence().await
    }

    /// Presence of one visitor, `None` for an unknown conversation.
    pub async fn client_presence(
        &self,
        conversation_id: &str,
    ) -> Result<Option<ClientPresence>, ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        self.presence.client_presence(&conversation_id).await
    }

    /// The agent console's conversation list.
    pub async fn conversation_summaries(
        &self,
        session: &SessionToken,
    ) -> Result<Vec<ConversationSummary>, ParleyError> {
        self.authorize(session)?;
        self.presence.conversation_summaries().await
    }

    /// The newest messages of a conversation, oldest first.
    pub async fn history(
        &self,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, ParleyError> {
        let conversation_id = ConversationId::parse(conversation_id)?;
        let limit = limit
            .unwrap_or(self.settings.history_default_limit)
            .clamp(1, self.settings.history_max_limit.max(1));
        self.messages.recent_messages(&conversation_id, limit).await
    }
}

fn required_text(text: &str) -> Result<&str, ParleyError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParleyError::invalid("text must not be empty"));
    }
    Ok(text)
}

/// `now`, bumped past `previous` when the clock has not advanced. Toggle
/// times are kept at microsecond precision, the resolution they are stored at.
fn next_toggle_time(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + ChronoDuration::microseconds(1),
        _ => now,
    }
}
