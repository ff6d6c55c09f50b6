// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech synthesis for the VoxRelay assistant.
//!
//! A [`Synthesizer`] holds an ordered chain of [`SynthStrategy`]
//! implementations and tries them in sequence; the first success wins.
//! Total failure is not an error at this boundary: the pipeline degrades to
//! a text reply, so [`voxrelay_core::SpeechSynth::synthesize`] returns
//! `Option`.

pub mod azure;
pub mod edge;

use async_trait::async_trait;
use tracing::{info, warn};
use voxrelay_core::SpeechSynth;

pub use azure::AzureRestSynth;
pub use edge::EdgeSynth;

/// One way of turning text into audio bytes.
#[async_trait]
pub trait SynthStrategy: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, voxrelay_core::RelayError>;
}

/// Ordered fallback chain over synthesis strategies.
pub struct Synthesizer {
    strategies: Vec<Box<dyn SynthStrategy>>,
}

impl Synthesizer {
    pub fn new(strategies: Vec<Box<dyn SynthStrategy>>) -> Self {
        Self { strategies }
    }

    /// The configured strategy names, in try order.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl SpeechSynth for Synthesizer {
    async fn synthesize(&self, text: &str) -> Option<Vec<u8>> {
        for strategy in &self.strategies {
            match strategy.synthesize(text).await {
                Ok(audio) if !audio.is_empty() => {
                    info!(strategy = strategy.name(), size = audio.len(), "speech synthesized");
                    return Some(audio);
                }
                Ok(_) => {
                    warn!(strategy = strategy.name(), "strategy returned empty audio");
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), error = %e, "strategy failed, trying next");
                }
            }
        }
        warn!("all synthesis strategies failed");
        None
    }
}

/// Escapes text for embedding in an SSML document.
pub(crate) fn escape_ssml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
