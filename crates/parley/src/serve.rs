// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve`: wire store, hub, coordinator, responder and gateway, then
//! run until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use parley_config::ParleyConfig;
use parley_core::ParleyError;
use parley_gateway::{GatewayState, SessionManager};
use parley_hub::{EventHub, HubSettings};
use parley_relay::{Coordinator, RelaySettings};
use parley_responder::ChatResponder;
use parley_storage::SqliteStore;
use tracing::{info, warn};

use crate::shutdown;

pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.logging.level);

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;
    info!(path = %config.storage.database_path, "storage ready");

    let hub = EventHub::new(hub_settings(&config));
    let sessions = Arc::new(SessionManager::new(&config.agent));
    if !sessions.login_enabled() {
        warn!("agent.password is not set, agent login is disabled");
    }

    let mut coordinator = Coordinator::new(
        store.clone(),
        store.clone(),
        hub.clone(),
        sessions.clone(),
        relay_settings(&config),
    );
    if let Some(responder) = ChatResponder::from_config(&config.responder)? {
        coordinator = coordinator.with_responder(Arc::new(responder));
    }
    let coordinator = Arc::new(coordinator);

    // Sessions live in memory, so no agent can still be online after a restart.
    coordinator.reset_agent_presence().await?;

    let cancel = shutdown::install_signal_handler();
    let shutdown_signal = {
        let hub = hub.clone();
        async move {
            cancel.cancelled().await;
            // Ends every open SSE stream so connections can drain.
            hub.shutdown();
        }
    };

    let state = GatewayState::new(coordinator, sessions);
    parley_gateway::serve(&config.server, state, shutdown_signal).await?;

    store.close().await?;
    info!("parley serve shutdown complete");
    Ok(())
}

fn hub_settings(config: &ParleyConfig) -> HubSettings {
    HubSettings {
        keepalive: Duration::from_secs(config.hub.keepalive_secs),
        retry: Duration::from_millis(config.hub.retry_ms),
        queue_capacity: config.hub.subscriber_queue_capacity,
    }
}

fn relay_settings(config: &ParleyConfig) -> RelaySettings {
    RelaySettings {
        responder_timeout: Duration::from_secs(config.responder.timeout_secs),
        history_default_limit: config.history.default_limit,
        history_max_limit: config.history.max_limit,
        agent_display_name: config.agent.display_name.clone(),
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
