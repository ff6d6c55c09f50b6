// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire models for the Evolution API webhook events.
//!
//! The relay subscribes to three events: `qrcode.updated`,
//! `connection.update`, and `messages.upsert`. Everything else is
//! acknowledged and ignored.

use serde::Deserialize;
use voxrelay_core::{InboundMessage, MessageKind};

/// The outer webhook envelope. `data` stays untyped here because its shape
/// depends on `event`; [`WebhookEvent::parse`] does the per-event decoding.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// A decoded webhook event.
#[derive(Debug)]
pub enum WebhookEvent {
    QrcodeUpdated { base64: Option<String> },
    ConnectionUpdate { state: String },
    MessageUpsert(InboundMessage),
    /// An event type the relay does not subscribe to.
    Unhandled { event: String },
}

/// Error describing why an envelope's `data` could not be decoded.
#[derive(Debug)]
pub struct WebhookParseError {
    pub event: String,
    pub detail: String,
}

impl std::fmt::Display for WebhookParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid `{}` payload: {}", self.event, self.detail)
    }
}

impl std::error::Error for WebhookParseError {}

impl WebhookEnvelope {
    /// Decodes `data` according to `event`.
    pub fn parse(self) -> Result<WebhookEvent, WebhookParseError> {
        match self.event.as_str() {
            "qrcode.updated" => {
                let data: QrcodeUpdatedData =
                    serde_json::from_value(self.data).map_err(|e| WebhookParseError {
                        event: self.event,
                        detail: e.to_string(),
                    })?;
                Ok(WebhookEvent::QrcodeUpdated {
                    base64: data.qrcode.and_then(|q| q.base64),
                })
            }
            "connection.update" => {
                let data: ConnectionUpdateData =
                    serde_json::from_value(self.data).map_err(|e| WebhookParseError {
                        event: self.event,
                        detail: e.to_string(),
                    })?;
                Ok(WebhookEvent::ConnectionUpdate {
                    state: data.state.unwrap_or_default(),
                })
            }
            "messages.upsert" => {
                let data: UpsertData =
                    serde_json::from_value(self.data).map_err(|e| WebhookParseError {
                        event: self.event,
                        detail: e.to_string(),
                    })?;
                Ok(WebhookEvent::MessageUpsert(data.into_inbound()))
            }
            _ => Ok(WebhookEvent::Unhandled { event: self.event }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QrcodeUpdatedData {
    #[serde(default)]
    qrcode: Option<QrcodeField>,
}

#[derive(Debug, Deserialize)]
struct QrcodeField {
    #[serde(default)]
    base64: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionUpdateData {
    #[serde(default)]
    state: Option<String>,
}

/// `messages.upsert` payload. The key is the only hard requirement; a
/// missing or unrecognized body degrades to [`MessageKind::Unsupported`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertData {
    pub key: UpsertKey,
    #[serde(default)]
    pub push_name: Option<String>,
    #[serde(default)]
    pub message: Option<UpsertBody>,
    #[serde(default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertKey {
    pub id: String,
    pub remote_jid: String,
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertBody {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub extended_text_message: Option<UpsertExtendedText>,
    #[serde(default)]
    pub audio_message: Option<UpsertAudio>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertAudio {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub seconds: Option<u32>,
}

impl UpsertData {
    /// Converts the wire payload into the domain message.
    pub fn into_inbound(self) -> InboundMessage {
        let kind = match self.message {
            Some(body) => {
                if let Some(audio) = body.audio_message {
                    MessageKind::Audio {
                        url: audio.url.unwrap_or_default(),
                        mime_type: audio
                            .mimetype
                            .unwrap_or_else(|| "audio/ogg; codecs=opus".to_string()),
                        seconds: audio.seconds,
                    }
                } else if let Some(text) = body
                    .conversation
                    .or(body.extended_text_message.and_then(|e| e.text))
                {
                    MessageKind::Text { body: text }
                } else {
                    MessageKind::Unsupported {
                        message_type: self
                            .message_type
                            .unwrap_or_else(|| "unknown".to_string()),
                    }
                }
            }
            None => MessageKind::Unsupported {
                message_type: self.message_type.unwrap_or_else(|| "unknown".to_string()),
            },
        };

        InboundMessage {
            id: self.key.id,
            remote_jid: self.key.remote_jid,
            from_me: self.key.from_me,
            push_name: self.push_name,
            kind,
        }
    }
}
