// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery-state coordination for the Parley chat relay.
//!
//! The [`Coordinator`] owns the rules of the conversation: who gets which
//! event, when messages count as seen, and when the automated responder
//! answers on the agent's behalf.

pub mod coordinator;
mod reply;

use std::time::Duration;

use chrono::{DateTime, SubsecRound, Utc};

pub use coordinator::{Coordinator, VisitorSubmission};

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Upper bound on one automated reply.
    pub responder_timeout: Duration,
    /// History window when the caller does not ask for one.
    pub history_default_limit: usize,
    /// Largest history window a caller may ask for.
    pub history_max_limit: usize,
    /// Name published with agent presence changes.
    pub agent_display_name: String,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            responder_timeout: Duration::from_secs(30),
            history_default_limit: 50,
            history_max_limit: 500,
            agent_display_name: "Admin".to_string(),
        }
    }
}

/// Current time at the microsecond precision timestamps are stored with.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
