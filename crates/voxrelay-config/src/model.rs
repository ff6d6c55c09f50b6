// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the VoxRelay assistant.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level VoxRelay configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values;
/// validation rejects the defaults where a real secret is required.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Evolution API messaging gateway settings.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Chat-completion vendor settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Speech-to-text vendor settings.
    #[serde(default)]
    pub whisper: WhisperConfig,

    /// Text-to-speech settings.
    #[serde(default)]
    pub tts: TtsConfig,

    /// Relay behavior settings.
    #[serde(default)]
    pub relay: RelaySettings,

    /// Timeouts and size limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Operator notification settings.
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the server to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Evolution API messaging gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Base URL of the Evolution API server.
    #[serde(default = "default_evolution_url")]
    pub base_url: String,

    /// Global API key, sent as the `apikey` header. Required.
    #[serde(default)]
    pub api_key: String,

    /// Name of the WhatsApp instance to create or connect.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            base_url: default_evolution_url(),
            api_key: String::new(),
            instance_name: default_instance_name(),
        }
    }
}

fn default_evolution_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_instance_name() -> String {
    "voxrelay".to_string()
}

/// Chat-completion vendor configuration (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// API key. Required.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_groq_url")]
    pub base_url: String,

    /// Model tried first for every reply.
    #[serde(default = "default_primary_model")]
    pub primary_model: String,

    /// Model tried when the primary fails.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: String,

    /// Maximum tokens to generate per reply. Kept short: replies become
    /// voice notes.
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_groq_url(),
            primary_model: default_primary_model(),
            fallback_model: default_fallback_model(),
            max_tokens: default_llm_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

fn default_groq_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_primary_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_fallback_model() -> String {
    "llama-3.1-8b-instant".to_string()
}

fn default_llm_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f64 {
    0.6
}

/// Speech-to-text vendor configuration (OpenAI-compatible Whisper endpoint).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WhisperConfig {
    /// API key. Required.
    #[serde(default)]
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_groq_url")]
    pub base_url: String,

    /// Whisper model name.
    #[serde(default = "default_whisper_model")]
    pub model: String,

    /// ISO 639-1 language hint passed to the transcription request.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_groq_url(),
            model: default_whisper_model(),
            language: default_language(),
        }
    }
}

fn default_whisper_model() -> String {
    "whisper-large-v3".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Text-to-speech configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TtsConfig {
    /// Azure Speech subscription key. `None` skips both Azure strategies
    /// and leaves Edge as the only synthesis path.
    #[serde(default)]
    pub azure_key: Option<String>,

    /// Azure Speech service region.
    #[serde(default = "default_azure_region")]
    pub azure_region: String,

    /// Azure neural voice name.
    #[serde(default = "default_voice")]
    pub azure_voice: String,

    /// Edge TTS voice name.
    #[serde(default = "default_voice")]
    pub edge_voice: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            azure_key: None,
            azure_region: default_azure_region(),
            azure_voice: default_voice(),
            edge_voice: default_voice(),
        }
    }
}

fn default_azure_region() -> String {
    "eastus".to_string()
}

fn default_voice() -> String {
    "en-US-AriaNeural".to_string()
}

/// Relay behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelaySettings {
    /// Preferred reply form: `audio` (voice note, degrading to text when
    /// synthesis fails) or `text`.
    #[serde(default = "default_response_type")]
    pub response_type: String,

    /// Booking link sent when a scheduling intent is detected. `None`
    /// disables the scheduling shortcut.
    #[serde(default)]
    pub calendar_link: Option<String>,

    /// Number of past conversation turns fetched for prompt context.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            response_type: default_response_type(),
            calendar_link: None,
            history_limit: default_history_limit(),
        }
    }
}

fn default_response_type() -> String {
    "audio".to_string()
}

fn default_history_limit() -> usize {
    10
}

/// Timeouts and size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Timeout for media download requests, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,

    /// Timeout for transcription and chat-completion requests, in seconds.
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,

    /// Maximum audio size accepted for transcription, in MiB.
    #[serde(default = "default_max_audio_size")]
    pub max_audio_size_mb: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: default_download_timeout(),
            inference_timeout_secs: default_inference_timeout(),
            max_audio_size_mb: default_max_audio_size(),
        }
    }
}

fn default_download_timeout() -> u64 {
    30
}

fn default_inference_timeout() -> u64 {
    60
}

fn default_max_audio_size() -> u64 {
    16
}

/// Operator notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Notification sink: `console` or `file`.
    #[serde(default = "default_sink")]
    pub sink: String,

    /// Alert log path, required when `sink = "file"`.
    #[serde(default)]
    pub file_path: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            file_path: None,
        }
    }
}

fn default_sink() -> String {
    "console".to_string()
}
