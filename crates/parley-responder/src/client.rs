// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat-completions APIs.

use std::time::Duration;

use parley_core::ParleyError;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse};

/// Chat-completions client with bearer auth and one retry on transient
/// statuses (429, 500, 502, 503).
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    max_retries: u32,
    retry_delay: Duration,
}

fn unavailable(message: String, source: Option<Box<dyn std::error::Error + Send + Sync>>) -> ParleyError {
    ParleyError::ResponderUnavailable { message, source }
}

impl ChatClient {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, ParleyError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| ParleyError::Config(format!("invalid responder API key: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| unavailable(format!("failed to build HTTP client: {e}"), Some(Box::new(e))))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            max_retries: 1,
            retry_delay: Duration::from_secs(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Shorten the pause between attempts (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Send one completion request.
    pub async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ParleyError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion after transient error");
                tokio::time::sleep(self.retry_delay).await;
            }

            let response = self
                .client
                .post(&self.endpoint)
                .json(request)
                .send()
                .await
                .map_err(|e| unavailable(format!("request failed: {e}"), Some(Box::new(e))))?;

            let status = response.status();
            debug!(%status, attempt, "completion response received");

            if status.is_success() {
                let body = response
                    .text()
                    .await
                    .map_err(|e| unavailable(format!("failed to read response: {e}"), Some(Box::new(e))))?;
                return serde_json::from_str(&body)
                    .map_err(|e| unavailable(format!("malformed response: {e}"), Some(Box::new(e))));
            }

            let body = response.text().await.unwrap_or_default();
            let error = unavailable(describe_failure(status, &body), None);
            if is_transient(status) && attempt < self.max_retries {
                warn!(%status, "transient completion error, will retry");
                last_error = Some(error);
                continue;
            }
            return Err(error);
        }

        Err(last_error
            .unwrap_or_else(|| unavailable("completion failed after retries".into(), None)))
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}

fn describe_failure(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(envelope) => match envelope.error.type_ {
            Some(kind) => format!("API error {status} ({kind}): {}", envelope.error.message),
            None => format!("API error {status}: {}", envelope.error.message),
        },
        Err(_) => format!("API returned {status}: {body}"),
    }
}
