// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints serde attributes cannot express: required
//! secrets present and not placeholder-valued, enumerated string fields,
//! sane numeric ranges.

use crate::diagnostic::ConfigError;
use crate::model::RelayConfig;

/// Placeholder values that count as "not configured" for required secrets.
/// Sample configs and quickstart docs use these; starting with one would
/// produce confusing vendor 401s at the first message instead of a clear
/// startup failure.
const PLACEHOLDER_MARKERS: &[&str] = &["changeme", "change-me", "xxx", "<", "your-", "your_"];

fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_ascii_lowercase();
    v.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| v.starts_with(m))
}

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // Required secrets. Missing or placeholder values abort startup.
    for (key, value) in [
        ("evolution.api_key", &config.evolution.api_key),
        ("llm.api_key", &config.llm.api_key),
        ("whisper.api_key", &config.whisper.api_key),
    ] {
        if is_placeholder(value) {
            errors.push(ConfigError::Validation {
                message: format!("{key} is missing or a placeholder; set a real API key"),
            });
        }
    }

    // The Azure key is optional, but a placeholder one is still a mistake.
    if let Some(key) = &config.tts.azure_key
        && is_placeholder(key)
    {
        errors.push(ConfigError::Validation {
            message: "tts.azure_key is set to a placeholder; remove it or set a real key"
                .to_string(),
        });
    }

    if config.server.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    }

    if config.evolution.instance_name.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "evolution.instance_name must not be empty".to_string(),
        });
    }

    for (key, value) in [
        ("evolution.base_url", &config.evolution.base_url),
        ("llm.base_url", &config.llm.base_url),
        ("whisper.base_url", &config.whisper.base_url),
    ] {
        if !value.starts_with("http://") && !value.starts_with("https://") {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be an http(s) URL, got `{value}`"),
            });
        }
    }

    if !matches!(config.relay.response_type.as_str(), "audio" | "text") {
        errors.push(ConfigError::Validation {
            message: format!(
                "relay.response_type must be `audio` or `text`, got `{}`",
                config.relay.response_type
            ),
        });
    }

    if !(0.0..=2.0).contains(&config.llm.temperature) {
        errors.push(ConfigError::Validation {
            message: format!(
                "llm.temperature must be between 0.0 and 2.0, got {}",
                config.llm.temperature
            ),
        });
    }

    if config.llm.max_tokens == 0 {
        errors.push(ConfigError::Validation {
            message: "llm.max_tokens must be at least 1".to_string(),
        });
    }

    if config.limits.max_audio_size_mb == 0 {
        errors.push(ConfigError::Validation {
            message: "limits.max_audio_size_mb must be at least 1".to_string(),
        });
    }

    match config.notification.sink.as_str() {
        "console" => {}
        "file" => {
            if config.notification.file_path.is_none() {
                errors.push(ConfigError::Validation {
                    message: "notification.file_path is required when notification.sink = `file`"
                        .to_string(),
                });
            }
        }
        other => errors.push(ConfigError::Validation {
            message: format!("notification.sink must be `console` or `file`, got `{other}`"),
        }),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
