// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the VoxRelay assistant.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and miette diagnostic rendering. Required vendor secrets are
//! checked at startup so a misconfigured relay refuses to boot instead of
//! failing on the first inbound message.
//!
//! # Usage
//!
//! ```no_run
//! use voxrelay_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("Instance: {}", config.evolution.instance_name);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RelayConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// This is the high-level entry point that:
/// 1. Loads config from TOML files + env vars via Figment
/// 2. On success: runs post-deserialization validation (secrets, ranges)
/// 3. On Figment error: converts to miette diagnostics
///
/// Returns either a valid `RelayConfig` or a list of diagnostic errors.
pub fn load_and_validate() -> Result<RelayConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<RelayConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from an explicit file path and validate it.
///
/// Used when the operator passes `--config path/to/voxrelay.toml`; env var
/// overrides still apply on top.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<RelayConfig, Vec<ConfigError>> {
    match loader::load_config_from_path(path) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}
