// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automated replies while no agent is online.
//!
//! Each reply runs in its own task under its own timeout, so a slow or
//! failing responder never delays the visitor's request or other visitors.

use std::sync::Arc;
use std::time::Duration;

use parley_core::events::MessagePayload;
use parley_core::{
    ChannelKey, ConversationId, HubEvent, HubEventKind, Message, MessageStore, ParleyError,
    Responder, Role,
};
use parley_hub::EventHub;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub(crate) struct AutoReply {
    pub(crate) responder: Arc<dyn Responder>,
    pub(crate) messages: Arc<dyn MessageStore>,
    pub(crate) hub: EventHub,
    pub(crate) timeout: Duration,
    pub(crate) lifecycle: Arc<RwLock<()>>,
}

impl AutoReply {
    /// Spawn the reply task. The handle resolves to the stored bot message,
    /// or `None` when no reply was produced.
    pub(crate) fn spawn(
        self,
        conversation_id: ConversationId,
        text: String,
    ) -> JoinHandle<Option<Message>> {
        tokio::spawn(async move { self.run(conversation_id, text).await })
    }

    async fn run(self, conversation_id: ConversationId, text: String) -> Option<Message> {
        let reply = match generate_reply(self.responder.as_ref(), self.timeout, &text).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    %conversation_id,
                    responder = self.responder.name(),
                    error = %err,
                    "no automated reply"
                );
                return None;
            }
        };

        // Held until the events are out, so a delete cannot slip in between.
        let _guard = self.lifecycle.read().await;
        let message = Message::new(conversation_id.clone(), Role::Bot, reply, crate::now());
        match self.messages.append_if_active(&message).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%conversation_id, "conversation deleted, automated reply dropped");
                return None;
            }
            Err(err) => {
                warn!(%conversation_id, error = %err, "failed to store automated reply");
                return None;
            }
        }

        let event = HubEventKind::Message(MessagePayload {
            message: message.clone(),
            client_temp_id: None,
        });
        self.hub.publish(
            &ChannelKey::conversation(&conversation_id),
            HubEvent::now(event.clone()),
        );
        self.hub.publish(&ChannelKey::AgentConsole, HubEvent::now(event));
        info!(%conversation_id, message_id = %message.id, "automated reply sent");
        Some(message)
    }
}

/// Ask `responder` for a reply to `text` within `timeout`.
///
/// An elapsed timeout is [`ParleyError::Timeout`]. Other failures and blank
/// replies become [`ParleyError::ResponderUnavailable`]. The reply is trimmed.
pub(crate) async fn generate_reply(
    responder: &dyn Responder,
    timeout: Duration,
    text: &str,
) -> Result<String, ParleyError> {
    debug!(responder = responder.name(), "requesting automated reply");
    let reply = match tokio::time::timeout(timeout, responder.generate_reply(text)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(err @ ParleyError::ResponderUnavailable { .. })) => return Err(err),
        Ok(Err(other)) => {
            return Err(ParleyError::ResponderUnavailable {
                message: "responder failed".to_string(),
                source: Some(Box::new(other)),
            });
        }
        Err(_) => return Err(ParleyError::Timeout { duration: timeout }),
    };

    let reply = reply.trim();
    if reply.is_empty() {
        return Err(ParleyError::ResponderUnavailable {
            message: "responder returned an empty reply".to_string(),
            source: None,
        });
    }
    Ok(reply.to_string())
}
