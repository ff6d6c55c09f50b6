// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling-intent shortcut.
//!
//! When the user clearly wants to book time, skipping the model and sending
//! the calendar link directly is both faster and more reliable than hoping
//! the model remembers to include it.

use regex::Regex;
use tracing::debug;

/// Detects booking intent and produces the calendar reply.
pub struct SchedulingDetector {
    pattern: Regex,
    calendar_link: String,
}

impl SchedulingDetector {
    pub fn new(calendar_link: String) -> Self {
        // Intent phrases, case-insensitive. Kept deliberately narrow: a
        // false positive hijacks the conversation with a link nobody asked
        // for, a false negative just means the model handles it.
        let pattern = Regex::new(
            r"(?i)\b(schedule|appointment|book (a |an )?(call|demo|meeting|slot)|calendar|availability|available times?|set up a (call|demo|meeting)|meeting next)\b",
        )
        .unwrap();
        Self {
            pattern,
            calendar_link,
        }
    }

    /// Returns the canned scheduling reply when `text` carries booking
    /// intent.
    pub fn detect(&self, text: &str) -> Option<String> {
        if !self.pattern.is_match(text) {
            return None;
        }
        debug!("scheduling intent detected");
        Some(format!(
            "I'd be glad to set that up! You can pick a time that suits you right here: {}. Looking forward to talking!",
            self.calendar_link
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> SchedulingDetector {
        SchedulingDetector::new("https://cal.example.com/sales".into())
    }

    #[test]
    fn booking_phrases_trigger_the_link() {
        for text in [
            "Can we schedule a call?",
            "I want to book a demo",
            "What's your availability this week?",
            "Do you have an appointment slot on Friday?",
        ] {
            let reply = detector().detect(text);
            assert!(
                reply
                    .as_deref()
                    .is_some_and(|r| r.contains("https://cal.example.com/sales")),
                "text: {text}"
            );
        }
    }

    #[test]
    fn ordinary_questions_do_not_trigger() {
        for text in [
            "How much does it cost?",
            "Tell me about your product",
            "Is the booking feature included in the basic plan?",
        ] {
            assert_eq!(detector().detect(text), None, "text: {text}");
        }
    }

    #[test]
    fn detection_is_case_insensitive() {
        assert!(detector().detect("SCHEDULE A MEETING PLEASE").is_some());
    }
}
