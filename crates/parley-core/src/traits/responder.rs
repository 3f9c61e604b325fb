// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Automated responder trait.

use async_trait::async_trait;

use crate::error::ParleyError;

/// Generates a fallback reply while no human agent is online.
///
/// Failures are reported as [`ParleyError::ResponderUnavailable`]; the relay
/// treats them as "no bot reply" and never forwards them to the visitor.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Produce a reply to the visitor's `text`.
    async fn generate_reply(&self, text: &str) -> Result<String, ParleyError>;
}
