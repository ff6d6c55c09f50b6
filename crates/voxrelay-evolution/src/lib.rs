// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evolution API integration: the REST client driving the WhatsApp instance
//! and the wire models for the webhook events it pushes back.
//!
//! [`EvolutionClient`] implements [`voxrelay_core::MessagingGateway`], so the
//! pipeline and the HTTP surface only ever see the trait.

pub mod client;
pub mod webhook;
mod wire;

pub use client::EvolutionClient;
pub use webhook::{WebhookEnvelope, WebhookEvent, WebhookParseError};
