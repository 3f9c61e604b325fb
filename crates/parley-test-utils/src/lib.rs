// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Parley integration tests.
//!
//! Provides mock collaborators and a harness for fast, deterministic tests
//! without network access.
//!
//! # Components
//!
//! - [`MockResponder`] - scripted automated responder
//! - [`FlakyStore`] - SQLite store whose writes can be made to fail
//! - [`TestHarness`] - coordinator, hub and store over a temp database

pub mod flaky_store;
pub mod harness;
pub mod mock_responder;

pub use flaky_store::FlakyStore;
pub use harness::{StaticSessions, TEST_AGENT_TOKEN, TestHarness, assert_quiet, next_event};
pub use mock_responder::{MockReply, MockResponder};
