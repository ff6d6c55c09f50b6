// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the VoxRelay assistant.

use thiserror::Error;

/// The primary error type used across all VoxRelay adapter traits and the
/// message pipeline.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Messaging gateway errors (instance management, media download, delivery).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        /// HTTP status the gateway answered with, when it answered at all.
        /// Drives retry classification.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Speech-to-text vendor errors (upload failure, rejected audio, quota).
    #[error("transcription error: {message}")]
    Transcription {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Reply generation errors (chat-completion failure across all models).
    #[error("reply error: {message}")]
    Reply {
        message: String,
        /// HTTP status the vendor answered with, when it answered at all.
        status: Option<u16>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Speech synthesis errors (one strategy failing; the chain may still recover).
    #[error("synthesis error: {message}")]
    Synthesis {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local filesystem errors around scratch audio files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
