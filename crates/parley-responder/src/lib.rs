// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible automated responder.
//!
//! Sends the visitor's text, preceded by the configured system prompt, to a
//! chat-completions endpoint and returns the first choice's text.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use parley_config::model::ResponderConfig;
use parley_core::{ParleyError, Responder};
use tracing::{debug, info};

pub use client::ChatClient;
use types::{ChatMessage, ChatRequest};

/// [`Responder`] backed by a chat-completions API.
#[derive(Debug, Clone)]
pub struct ChatResponder {
    client: ChatClient,
    model: String,
    temperature: f32,
    system_prompt: String,
}

impl ChatResponder {
    /// Build from config. Returns `Ok(None)` when no API key is configured,
    /// which leaves the relay without an automated responder.
    pub fn from_config(config: &ResponderConfig) -> Result<Option<Self>, ParleyError> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) else {
            info!("no responder API key configured, automated replies disabled");
            return Ok(None);
        };
        let client = ChatClient::new(
            api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, endpoint = client.endpoint(), "automated responder enabled");
        Ok(Some(Self::with_client(client, config)))
    }

    pub fn with_client(client: ChatClient, config: &ResponderConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            system_prompt: config.system_prompt.clone(),
        }
    }

    fn request(&self, text: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !self.system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(self.system_prompt.clone()));
        }
        messages.push(ChatMessage::user(text));
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl Responder for ChatResponder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_reply(&self, text: &str) -> Result<String, ParleyError> {
        let response = self.client.complete(&self.request(text)).await?;
        let reply = response.first_text().map(str::trim).unwrap_or_default();
        if reply.is_empty() {
            return Err(ParleyError::ResponderUnavailable {
                message: "completion contained no text".to_string(),
                source: None,
            });
        }
        debug!(model = %self.model, chars = reply.len(), "completion received");
        Ok(reply.to_string())
    }
}
