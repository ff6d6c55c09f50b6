// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions: the seams between the pipeline and the
//! external vendors it orchestrates.
//!
//! All traits use `#[async_trait]` for dynamic dispatch, so the pipeline can
//! hold `Arc<dyn ...>` handles and tests can substitute mocks.

use std::path::Path;

use async_trait::async_trait;

use crate::error::RelayError;
use crate::scratch::ScratchFile;
use crate::types::{
    ConnectOutcome, ConnectionStatus, ConversationTurn, InboundMessage, ScopeDecision,
};

/// Adapter for the WhatsApp messaging gateway (Evolution-API-compatible).
///
/// Delivery methods (`send_text`, `send_audio`) report success as a bool and
/// never error: a failed send is logged and counted, not propagated, so one
/// user's delivery problem cannot take down the pipeline task.
#[async_trait]
pub trait MessagingGateway: Send + Sync + 'static {
    /// Creates the instance, or connects to it when it already exists.
    ///
    /// A name conflict means the instance is provisioned; the adapter must
    /// switch to connecting it, never delete and recreate.
    async fn create_or_connect(&self) -> Result<ConnectOutcome, RelayError>;

    /// Fetches the live connection state. Soft-fails to
    /// [`ConnectionStatus::Unknown`] when the gateway is unreachable.
    async fn connection_state(&self) -> ConnectionStatus;

    /// Downloads the media attached to `msg` into a scratch file.
    /// `None` on any failure; the caller decides how to degrade.
    async fn download_media(&self, msg: &InboundMessage) -> Option<ScratchFile>;

    /// Fetches recent conversation turns with `remote_jid`, oldest first.
    async fn fetch_history(
        &self,
        remote_jid: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RelayError>;

    /// Sends a plain text message. Returns delivery success.
    async fn send_text(&self, to: &str, text: &str) -> bool;

    /// Sends an audio file as a voice note, optionally quoting the message
    /// with id `quoted`. Returns delivery success.
    async fn send_audio(&self, to: &str, audio: &Path, quoted: Option<&str>) -> bool;

    /// Tears the instance down. Explicit disconnect only.
    async fn delete_instance(&self) -> Result<(), RelayError>;
}

/// Adapter for speech-to-text transcription.
#[async_trait]
pub trait Transcriber: Send + Sync + 'static {
    /// Transcribes the audio file at `audio` and returns the text.
    async fn transcribe(&self, audio: &Path) -> Result<String, RelayError>;
}

/// Adapter for generating the assistant's reply text.
#[async_trait]
pub trait ReplyEngine: Send + Sync + 'static {
    /// Produces a reply to `user_text` given prior conversation turns
    /// (oldest first; may be empty).
    async fn generate(
        &self,
        user_text: &str,
        history: &[ConversationTurn],
    ) -> Result<String, RelayError>;
}

/// Policy deciding whether a user utterance is within the assistant's remit.
///
/// Evaluated before the reply engine is invoked, so a deflection costs no
/// model tokens. Implementations must be cheap and side-effect free apart
/// from internal rotation state.
pub trait ScopePolicy: Send + Sync + 'static {
    fn evaluate(&self, user_text: &str) -> ScopeDecision;
}

/// Adapter for text-to-speech synthesis.
#[async_trait]
pub trait SpeechSynth: Send + Sync + 'static {
    /// Synthesizes `text` to encoded audio bytes. `None` when every
    /// configured strategy failed; the pipeline then degrades to text.
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>>;
}
