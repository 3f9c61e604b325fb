// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Parley chat relay.
//!
//! Exposes the hub's subscriber streams as Server-Sent Events and the
//! coordinator's actions as JSON endpoints. Agent-only routes sit behind
//! [`auth::require_agent`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod sse;

pub use auth::SessionManager;
pub use error::ApiError;
pub use server::{GatewayState, build_router, serve};
