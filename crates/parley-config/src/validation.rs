// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::ParleyConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate `config`, collecting every problem instead of stopping at the first.
pub fn validate_config(config: &ParleyConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "server.host `{host}` is not an IP address or hostname"
        )));
    }

    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ConfigError::validation(format!(
            "logging.level `{}` must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.hub.keepalive_secs == 0 {
        errors.push(ConfigError::validation(
            "hub.keepalive_secs must be at least 1",
        ));
    }
    if config.hub.subscriber_queue_capacity == 0 {
        errors.push(ConfigError::validation(
            "hub.subscriber_queue_capacity must be at least 1",
        ));
    }

    if config.agent.username.trim().is_empty() {
        errors.push(ConfigError::validation("agent.username must not be empty"));
    }
    if config
        .agent
        .password
        .as_deref()
        .is_some_and(|p| p.is_empty())
    {
        errors.push(ConfigError::validation(
            "agent.password must not be empty; remove it to disable login",
        ));
    }
    if config.agent.session_ttl_secs == 0 {
        errors.push(ConfigError::validation(
            "agent.session_ttl_secs must be at least 1",
        ));
    }

    if !(0.0..=2.0).contains(&config.responder.temperature) {
        errors.push(ConfigError::validation(format!(
            "responder.temperature must be between 0.0 and 2.0, got {}",
            config.responder.temperature
        )));
    }
    if config.responder.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "responder.timeout_secs must be at least 1",
        ));
    }
    if !config.responder.base_url.starts_with("http://")
        && !config.responder.base_url.starts_with("https://")
    {
        errors.push(ConfigError::validation(format!(
            "responder.base_url `{}` must be an http(s) URL",
            config.responder.base_url
        )));
    }

    if config.history.default_limit == 0 {
        errors.push(ConfigError::validation(
            "history.default_limit must be at least 1",
        ));
    }
    if config.history.max_limit < config.history.default_limit {
        errors.push(ConfigError::validation(format!(
            "history.max_limit ({}) must not be below history.default_limit ({})",
            config.history.max_limit, config.history.default_limit
        )));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
