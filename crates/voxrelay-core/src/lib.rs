// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the VoxRelay voice assistant.
//!
//! This crate provides the error type, domain types, and the adapter traits
//! sitting between the message pipeline and the external vendors (messaging
//! gateway, speech-to-text, chat completion, speech synthesis). Vendor crates
//! implement the traits defined here.

pub mod error;
pub mod notify;
pub mod scratch;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::RelayError;
pub use scratch::ScratchFile;
pub use types::{
    ConnectOutcome, ConnectionStatus, ConversationTurn, InboundMessage, MessageKind,
    ScopeDecision,
};

// Re-export the adapter traits at crate root.
pub use traits::{MessagingGateway, ReplyEngine, ScopePolicy, SpeechSynth, Transcriber};
