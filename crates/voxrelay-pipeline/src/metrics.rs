// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local relay metrics.
//!
//! An owned counter object rather than a global recorder: the dashboard and
//! health endpoints render the counters as JSON, and tests assert exact
//! values on isolated instances.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Counters for the relay's message flow. Cheap to share behind an `Arc`;
/// increments are atomic and lock-free.
#[derive(Debug)]
pub struct RelayMetrics {
    started: Instant,
    total_received: AtomicU64,
    audio_processed: AtomicU64,
    responses_sent: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time view of the counters, serialized into dashboard and health
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub total_received: u64,
    pub audio_processed: u64,
    pub responses_sent: u64,
    pub errors: u64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_received: AtomicU64::new(0),
            audio_processed: AtomicU64::new(0),
            responses_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// A message event was accepted for processing.
    pub fn record_received(&self) {
        self.total_received.fetch_add(1, Ordering::Relaxed);
    }

    /// A voice note was successfully transcribed.
    pub fn record_audio_processed(&self) {
        self.audio_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A reply (voice or degraded text) was delivered.
    pub fn record_response_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// A pipeline stage failed terminally for one message.
    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            total_received: self.total_received.load(Ordering::Relaxed),
            audio_processed: self.audio_processed.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}
