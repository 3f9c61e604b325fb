// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/parley/parley.toml`,
//! `~/.config/parley/parley.toml`, `./parley.toml`, then `PARLEY_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is foreign

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ParleyConfig;

/// Top-level sections, used to split `PARLEY_SECTION_KEY` into `section.key`.
const SECTIONS: &[&str] = &[
    "server",
    "logging",
    "storage",
    "hub",
    "agent",
    "responder",
    "history",
];

pub(crate) const SYSTEM_CONFIG: &str = "/etc/parley/parley.toml";
pub(crate) const LOCAL_CONFIG: &str = "parley.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("parley").join("parley.toml"))
}

/// Every file the standard lookup reads, lowest priority first.
pub(crate) fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    paths.extend(user_config_path());
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// The full figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

/// Load from the standard file hierarchy plus environment overrides.
pub fn load_config() -> Result<ParleyConfig, figment::Error> {
    build_figment().extract()
}

/// Load one explicit file (as passed with `--config`) plus environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<ParleyConfig, figment::Error> {
    defaults()
        .merge(Toml::file_exact(path))
        .merge(env_provider())
        .extract()
}

/// Load from an inline TOML document, ignoring files and environment.
pub fn load_config_from_str(toml_content: &str) -> Result<ParleyConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

fn defaults() -> Figment {
    Figment::new().merge(Serialized::defaults(ParleyConfig::default()))
}

/// `PARLEY_HUB_KEEPALIVE_SECS` -> `hub.keepalive_secs`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores stay intact.
fn env_provider() -> Env {
    Env::prefixed("PARLEY_").map(|key| {
        let key = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|field| format!("{section}.{field}"))
            })
            .unwrap_or_else(|| key.to_string())
            .into()
    })
}
