// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across the adapter traits and the message pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The body of an inbound WhatsApp message, normalized from the gateway's
/// webhook payload.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// A voice note or audio attachment.
    Audio {
        /// Media URL as reported by the gateway (used for logging; the actual
        /// bytes come through the gateway's media-download endpoint).
        url: String,
        mime_type: String,
        /// Duration in seconds, when the gateway reports it.
        seconds: Option<u32>,
    },
    /// A plain text message.
    Text { body: String },
    /// Anything the relay does not handle (images, stickers, reactions, ...).
    Unsupported { message_type: String },
}

/// An inbound message accepted from the webhook. Request-scoped: built per
/// event and handed to a single pipeline run.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Gateway message id, echoed back when quoting the reply.
    pub id: String,
    /// Sender JID (`<number>@s.whatsapp.net`).
    pub remote_jid: String,
    /// True when the message was sent by the relay's own session.
    pub from_me: bool,
    /// Sender display name, when the gateway provides one.
    pub push_name: Option<String>,
    pub kind: MessageKind,
}

impl InboundMessage {
    /// The bare phone number portion of the sender JID.
    pub fn sender_number(&self) -> &str {
        self.remote_jid
            .split_once('@')
            .map(|(n, _)| n)
            .unwrap_or(&self.remote_jid)
    }
}

/// One turn of conversation history, used only for prompt construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// True when the turn was produced by the assistant.
    pub from_bot: bool,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Normalized outcome of a session-establishment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// A QR code to scan, as a base64 PNG payload.
    Qr(String),
    /// A pairing code to type into the phone.
    PairingCode(String),
    /// The instance already has a live session.
    AlreadyConnected,
    /// The gateway accepted the request but produced no credential yet.
    NotReady,
}

/// Connection state of the messaging session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Session is established and messages flow.
    Open,
    /// Handshake in progress (QR pending or reconnecting).
    Connecting,
    /// Session closed or logged out.
    Closed,
    /// State could not be determined (gateway unreachable).
    Unknown,
}

impl ConnectionStatus {
    pub fn is_open(self) -> bool {
        matches!(self, ConnectionStatus::Open)
    }

    /// Parses the gateway's state string, defaulting to `Unknown`.
    pub fn from_gateway(state: &str) -> Self {
        match state {
            "open" => ConnectionStatus::Open,
            "connecting" => ConnectionStatus::Connecting,
            "close" | "closed" => ConnectionStatus::Closed,
            _ => ConnectionStatus::Unknown,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionStatus::Open => "open",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Closed => "closed",
            ConnectionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Verdict of a scope policy on a user utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeDecision {
    /// On-topic; proceed to reply generation.
    Allow,
    /// Off-topic; send the given deflection instead of invoking the model.
    Deflect(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_number_strips_jid_suffix() {
        let msg = InboundMessage {
            id: "ABC".into(),
            remote_jid: "5511999999999@s.whatsapp.net".into(),
            from_me: false,
            push_name: None,
            kind: MessageKind::Text { body: "hi".into() },
        };
        assert_eq!(msg.sender_number(), "5511999999999");
    }

    #[test]
    fn sender_number_passes_through_bare_numbers() {
        let msg = InboundMessage {
            id: "ABC".into(),
            remote_jid: "5511999999999".into(),
            from_me: false,
            push_name: None,
            kind: MessageKind::Text { body: "hi".into() },
        };
        assert_eq!(msg.sender_number(), "5511999999999");
    }

    #[test]
    fn connection_status_parses_gateway_states() {
        assert_eq!(ConnectionStatus::from_gateway("open"), ConnectionStatus::Open);
        assert_eq!(
            ConnectionStatus::from_gateway("connecting"),
            ConnectionStatus::Connecting
        );
        assert_eq!(ConnectionStatus::from_gateway("close"), ConnectionStatus::Closed);
        assert_eq!(
            ConnectionStatus::from_gateway("banana"),
            ConnectionStatus::Unknown
        );
    }
}
