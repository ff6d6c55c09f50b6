// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword-based scope policy.
//!
//! The assistant sells software services; it should not be dragged into
//! chit-chat about football scores or medical advice. The default policy is
//! a cheap keyword heuristic evaluated before any model call, with a
//! rotating pool of polite deflections so repeated off-topic attempts do not
//! read like a broken record.

use std::sync::atomic::{AtomicUsize, Ordering};

use voxrelay_core::{ScopeDecision, ScopePolicy};

/// Topics the assistant refuses to engage with. Matching is on whole words,
/// lowercased.
const OFF_TOPIC_KEYWORDS: &[&str] = &[
    "weather",
    "forecast",
    "football",
    "soccer",
    "basketball",
    "game score",
    "politics",
    "election",
    "president",
    "religion",
    "recipe",
    "cooking",
    "movie",
    "netflix",
    "song",
    "lyrics",
    "joke",
    "horoscope",
    "lottery",
    "bitcoin",
    "crypto",
    "stock tip",
    "homework",
    "medical advice",
    "diagnosis",
];

const DEFLECTIONS: &[&str] = &[
    "That's a bit outside what I can help with, but I'd love to tell you about our services. What challenge is your team working on?",
    "I'll have to pass on that one! What I can do is walk you through how we could help your business. What are you looking to improve?",
    "Not really my area, I'm afraid. I'm here to help with our products and pricing. Is there something on that front I can answer?",
    "I'd rather not guess at that. Where I can genuinely help is with our solutions and booking a demo. Want to hear more?",
];

/// Default scope policy: deflect when an off-topic keyword appears.
pub struct KeywordScopePolicy {
    /// Round-robin cursor into the deflection pool. Deterministic rotation
    /// instead of random choice keeps tests stable.
    next_deflection: AtomicUsize,
}

impl KeywordScopePolicy {
    pub fn new() -> Self {
        Self {
            next_deflection: AtomicUsize::new(0),
        }
    }
}

impl Default for KeywordScopePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopePolicy for KeywordScopePolicy {
    fn evaluate(&self, user_text: &str) -> ScopeDecision {
        let lowered = user_text.to_lowercase();
        let off_topic = OFF_TOPIC_KEYWORDS
            .iter()
            .any(|keyword| contains_phrase(&lowered, keyword));

        if off_topic {
            let idx = self.next_deflection.fetch_add(1, Ordering::Relaxed) % DEFLECTIONS.len();
            ScopeDecision::Deflect(DEFLECTIONS[idx].to_string())
        } else {
            ScopeDecision::Allow
        }
    }
}

/// Whole-word phrase match: `"stock tip"` matches `"any stock tips?"` stems
/// aside, but `"crypto"` must not match `"encrypted"`.
fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(phrase) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + phrase.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
    }
    false
}
