// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message-processing pipeline.
//!
//! One inbound message becomes one detached task running the stage ladder:
//! download, transcribe, reason, synthesize, send. Each stage has a defined
//! degradation path; no failure escapes the task, so the webhook handler can
//! acknowledge immediately and one user's bad audio never affects another's.

pub mod metrics;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};
use voxrelay_core::notify::Notifier;
use voxrelay_core::{
    InboundMessage, MessageKind, MessagingGateway, RelayError, ReplyEngine, ScratchFile,
    SpeechSynth, Transcriber,
};

pub use metrics::{MetricsSnapshot, RelayMetrics};

/// Sent when the voice note could not be fetched from the gateway. The user
/// spoke and deserves to know the relay heard nothing.
const DOWNLOAD_APOLOGY: &str =
    "Sorry, I couldn't receive your voice note. Could you try sending it again?";

/// Preferred reply form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// Voice note, degrading to text when every synthesis strategy fails.
    Audio,
    /// Text only; the synthesizer is never invoked.
    Text,
}

impl ResponseMode {
    /// Parses the config value; anything unrecognized means audio.
    pub fn from_config(value: &str) -> Self {
        match value {
            "text" => ResponseMode::Text,
            _ => ResponseMode::Audio,
        }
    }
}

/// The assembled pipeline. Clone is cheap; every stage sits behind an `Arc`.
#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<dyn MessagingGateway>,
    transcriber: Arc<dyn Transcriber>,
    reply_engine: Arc<dyn ReplyEngine>,
    synth: Arc<dyn SpeechSynth>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<RelayMetrics>,
    mode: ResponseMode,
    history_limit: usize,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn MessagingGateway>,
        transcriber: Arc<dyn Transcriber>,
        reply_engine: Arc<dyn ReplyEngine>,
        synth: Arc<dyn SpeechSynth>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<RelayMetrics>,
        mode: ResponseMode,
        history_limit: usize,
    ) -> Self {
        Self {
            gateway,
            transcriber,
            reply_engine,
            synth,
            notifier,
            metrics,
            mode,
            history_limit,
        }
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Schedules a detached task for one inbound message. The task owns its
    /// whole failure surface: unexpected errors and panics are logged,
    /// counted, and reported to the notifier, never propagated.
    pub fn spawn(&self, msg: InboundMessage) -> tokio::task::JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            let message_id = msg.id.clone();
            // The panic hook has already printed the backtrace by the time
            // the unwind is caught here.
            match AssertUnwindSafe(pipeline.run(msg)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    pipeline.metrics.record_error();
                    error!(message_id = %message_id, error = %e, "pipeline task failed");
                    pipeline
                        .notifier
                        .alert(
                            "pipeline_failure",
                            &format!("message {message_id} failed: {e}"),
                        )
                        .await;
                }
                Err(payload) => {
                    let detail = panic_detail(payload.as_ref());
                    pipeline.metrics.record_error();
                    error!(message_id = %message_id, detail = %detail, "pipeline task panicked");
                    pipeline
                        .notifier
                        .alert(
                            "pipeline_panic",
                            &format!("message {message_id} panicked: {detail}"),
                        )
                        .await;
                }
            }
        })
    }

    /// Runs the stage ladder for one message. Stage-specific degradations
    /// (apology, silence, text fallback) are handled inside and return `Ok`;
    /// `Err` is reserved for failures no stage owns.
    pub async fn run(&self, msg: InboundMessage) -> Result<(), RelayError> {
        if msg.from_me {
            // Filtered at the webhook; a second guard keeps the loop
            // impossible even if a caller wires the pipeline directly.
            debug!(message_id = %msg.id, "ignoring self-originated message");
            return Ok(());
        }

        self.metrics.record_received();
        let sender = msg.sender_number().to_string();

        let user_text = match &msg.kind {
            MessageKind::Text { body } => body.clone(),
            MessageKind::Audio { seconds, .. } => {
                debug!(message_id = %msg.id, seconds = ?seconds, "processing voice note");
                let Some(scratch) = self.gateway.download_media(&msg).await else {
                    warn!(message_id = %msg.id, "media download failed, sending apology");
                    self.metrics.record_error();
                    self.gateway.send_text(&sender, DOWNLOAD_APOLOGY).await;
                    return Ok(());
                };

                // The scratch file lives exactly as long as this block.
                match self.transcriber.transcribe(scratch.path()).await {
                    Ok(transcript) => {
                        self.metrics.record_audio_processed();
                        debug!(message_id = %msg.id, chars = transcript.len(), "transcribed");
                        transcript
                    }
                    Err(e) => {
                        // Stays silent toward the user: an apology here would
                        // double-message people whose audio was just noisy.
                        warn!(message_id = %msg.id, error = %e, "transcription failed");
                        self.metrics.record_error();
                        return Ok(());
                    }
                }
            }
            MessageKind::Unsupported { message_type } => {
                debug!(message_id = %msg.id, message_type = %message_type, "unsupported message kind");
                return Ok(());
            }
        };

        let history = match self
            .gateway
            .fetch_history(&msg.remote_jid, self.history_limit)
            .await
        {
            Ok(turns) => turns,
            Err(e) => {
                // Context is nice to have, not load-bearing.
                warn!(message_id = %msg.id, error = %e, "history fetch failed, continuing without");
                Vec::new()
            }
        };

        let reply = match self.reply_engine.generate(&user_text, &history).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "reply generation failed");
                self.metrics.record_error();
                self.notifier
                    .alert("reply_failure", &format!("message {}: {e}", msg.id))
                    .await;
                return Ok(());
            }
        };

        let delivered = match self.mode {
            ResponseMode::Text => self.gateway.send_text(&sender, &reply).await,
            ResponseMode::Audio => match self.synth.synthesize(&reply).await {
                Some(audio) => {
                    let scratch = ScratchFile::with_bytes("mp3", &audio).await?;
                    self.gateway
                        .send_audio(&sender, scratch.path(), Some(&msg.id))
                        .await
                }
                None => {
                    // Degraded but successful: the user still gets an answer.
                    info!(message_id = %msg.id, "synthesis unavailable, replying with text");
                    self.gateway.send_text(&sender, &reply).await
                }
            },
        };

        if delivered {
            self.metrics.record_response_sent();
            info!(message_id = %msg.id, to = %sender, "reply delivered");
        } else {
            warn!(message_id = %msg.id, to = %sender, "reply delivery failed");
            self.metrics.record_error();
        }

        Ok(())
    }
}

/// Best-effort rendering of a panic payload; `panic!` with a message yields
/// `&str` or `String`, anything else is opaque.
fn panic_detail(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
