// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply generation for the VoxRelay sales assistant.
//!
//! [`Brain`] implements [`voxrelay_core::ReplyEngine`]: it screens the
//! utterance through the scope policy and the scheduling detector, then
//! prompts an OpenAI-compatible model with the conversation history,
//! falling back to a second model when the primary fails.

pub mod client;
pub mod scheduling;
pub mod scope;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use voxrelay_core::{ConversationTurn, RelayError, ReplyEngine, ScopeDecision, ScopePolicy};
use voxrelay_resilience::{is_transient, retry, RetryPolicy};

pub use client::{ChatClient, ChatMessage};
pub use scheduling::SchedulingDetector;
pub use scope::KeywordScopePolicy;

/// Shorter inputs than this are noise (a stray "ok", a transcription of a
/// cough) and get a clarifying question instead of a model call.
const MIN_INPUT_CHARS: usize = 3;

const CLARIFY_REPLY: &str =
    "Sorry, I didn't quite catch that. Could you say it again with a bit more detail?";

/// Fixed persona. Replies become voice notes, so the prompt pushes hard for
/// brevity and plain speech.
const SYSTEM_PROMPT: &str = "\
You are Riley, a friendly sales development representative for a software \
services company. You help prospects over WhatsApp voice notes.

Rules:
- Keep replies to 1-3 short sentences of natural spoken English. They will \
be read aloud, so no emojis, no bullet points, no markdown, no URLs unless \
the user asked for one.
- Only discuss the company's services, pricing, onboarding, and scheduling a \
demo. Politely steer anything else back to those topics.
- Be warm and concrete. When you don't know a detail, offer to have a \
specialist follow up instead of inventing one.
- End with a short question that moves the conversation forward.";

/// Reply generator with scope screening and a primary/fallback model chain.
pub struct Brain {
    client: ChatClient,
    primary_model: String,
    fallback_model: String,
    scope: Arc<dyn ScopePolicy>,
    scheduling: Option<SchedulingDetector>,
    retry_policy: RetryPolicy,
}

impl Brain {
    pub fn new(
        client: ChatClient,
        primary_model: String,
        fallback_model: String,
        scope: Arc<dyn ScopePolicy>,
        scheduling: Option<SchedulingDetector>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            primary_model,
            fallback_model,
            scope,
            scheduling,
            retry_policy,
        }
    }

    fn build_messages(user_text: &str, history: &[ConversationTurn]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        for turn in history {
            if turn.from_bot {
                messages.push(ChatMessage::assistant(turn.text.clone()));
            } else {
                messages.push(ChatMessage::user(turn.text.clone()));
            }
        }
        messages.push(ChatMessage::user(user_text));
        messages
    }
}

/// Strips wrapping quotes and markdown asterisks the models like to add.
/// The reply is spoken by the synthesizer, where either reads as noise.
fn clean_reply(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    unquoted.replace('*', "").trim().to_string()
}

#[async_trait]
impl ReplyEngine for Brain {
    async fn generate(
        &self,
        user_text: &str,
        history: &[ConversationTurn],
    ) -> Result<String, RelayError> {
        let text = user_text.trim();
        if text.chars().count() < MIN_INPUT_CHARS {
            debug!("input too short, asking for clarification");
            return Ok(CLARIFY_REPLY.to_string());
        }

        if let ScopeDecision::Deflect(reply) = self.scope.evaluate(text) {
            info!("off-topic message deflected");
            return Ok(reply);
        }

        if let Some(detector) = &self.scheduling
            && let Some(reply) = detector.detect(text)
        {
            return Ok(reply);
        }

        let messages = Self::build_messages(text, history);

        let primary = retry(
            self.retry_policy,
            "chat_completion",
            || self.client.complete(&self.primary_model, &messages),
            is_transient,
        )
        .await;

        let raw = match primary {
            Ok(reply) => reply,
            Err(e) => {
                warn!(
                    model = %self.primary_model,
                    fallback = %self.fallback_model,
                    error = %e,
                    "primary model failed, trying fallback"
                );
                self.client.complete(&self.fallback_model, &messages).await?
            }
        };

        Ok(clean_reply(&raw))
    }
}
