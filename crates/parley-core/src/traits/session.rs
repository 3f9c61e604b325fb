// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent session verification.

use crate::types::SessionToken;

/// Answers whether a token belongs to a live, authenticated agent session.
pub trait SessionAuthority: Send + Sync {
    fn is_authenticated(&self, token: &SessionToken) -> bool;
}
