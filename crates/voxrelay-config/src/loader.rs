// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./voxrelay.toml` > `~/.config/voxrelay/voxrelay.toml`
//! > `/etc/voxrelay/voxrelay.toml` with environment variable overrides via
//! `VOXRELAY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::RelayConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/voxrelay/voxrelay.toml` (system-wide)
/// 3. `~/.config/voxrelay/voxrelay.toml` (user XDG config)
/// 4. `./voxrelay.toml` (local directory)
/// 5. `VOXRELAY_*` environment variables
pub fn load_config() -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file("/etc/voxrelay/voxrelay.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("voxrelay/voxrelay.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("voxrelay.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RelayConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RelayConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `VOXRELAY_EVOLUTION_API_KEY` must map to
/// `evolution.api_key`, not `evolution.api.key`.
fn env_provider() -> Env {
    Env::prefixed("VOXRELAY_").map(|key| {
        // `key` is the env var name with prefix stripped; figment preserves
        // the original case, so lowercase before matching section prefixes.
        // Example: VOXRELAY_LLM_PRIMARY_MODEL -> "llm_primary_model"
        let key_str = key.as_str().to_ascii_lowercase();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("evolution_", "evolution.", 1)
            .replacen("llm_", "llm.", 1)
            .replacen("whisper_", "whisper.", 1)
            .replacen("tts_", "tts.", 1)
            .replacen("relay_", "relay.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("notification_", "notification.", 1);
        mapped.into()
    })
}
