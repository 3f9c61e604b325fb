// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Parley chat relay.
//!
//! WAL-mode SQLite with embedded refinery migrations, accessed through a
//! single `tokio-rusqlite` connection. [`SqliteStore`] implements both
//! [`MessageStore`](parley_core::MessageStore) and
//! [`PresenceStore`](parley_core::PresenceStore).

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
