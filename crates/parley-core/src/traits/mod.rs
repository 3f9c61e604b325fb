// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits: persistence, automated replies, agent sessions.

pub mod responder;
pub mod session;
pub mod store;

pub use responder::Responder;
pub use session::SessionAuthority;
pub use store::{MessageStore, PresenceStore};
