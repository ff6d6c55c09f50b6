// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request and response models for the Evolution API REST surface.
//!
//! Response models deliberately do NOT use `deny_unknown_fields`: the gateway
//! adds fields between minor versions and the relay only cares about the
//! handful modeled here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInstanceRequest<'a> {
    pub instance_name: &'a str,
    pub qrcode: bool,
    pub integration: &'a str,
}

/// QR/pairing credential payload, appearing both nested under `qrcode` in
/// create responses and at top level in connect responses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
    #[serde(default)]
    pub base64: Option<String>,
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl QrPayload {
    pub fn is_empty(&self) -> bool {
        self.base64.is_none() && self.pairing_code.is_none() && self.code.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InstanceState {
    #[serde(default)]
    pub state: Option<String>,
}

/// Response of both `POST /instance/create` and `GET /instance/connect/{name}`.
#[derive(Debug, Default, Deserialize)]
pub struct ConnectResponse {
    #[serde(default)]
    pub instance: Option<InstanceState>,
    #[serde(default)]
    pub qrcode: Option<QrPayload>,
    /// Connect responses put the credential fields at top level.
    #[serde(flatten)]
    pub direct: QrPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConnectionStateResponse {
    #[serde(default)]
    pub instance: Option<InstanceState>,
}

#[derive(Debug, Serialize)]
pub struct MediaRequest<'a> {
    pub message: MediaMessageRef<'a>,
    #[serde(rename = "convertToMp4")]
    pub convert_to_mp4: bool,
}

#[derive(Debug, Serialize)]
pub struct MediaMessageRef<'a> {
    pub key: KeyRef<'a>,
}

#[derive(Debug, Serialize)]
pub struct KeyRef<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct MediaResponse {
    pub base64: String,
}

#[derive(Debug, Serialize)]
pub struct FindMessagesRequest<'a> {
    pub r#where: FindMessagesWhere<'a>,
    pub limit: usize,
}

#[derive(Debug, Serialize)]
pub struct FindMessagesWhere<'a> {
    pub key: FindMessagesKey<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindMessagesKey<'a> {
    pub remote_jid: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct FindMessagesResponse {
    #[serde(default)]
    pub messages: MessagePage,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagePage {
    #[serde(default)]
    pub records: Vec<HistoryRecord>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub key: HistoryKey,
    #[serde(default)]
    pub message: Option<HistoryBody>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub message_timestamp: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryKey {
    #[serde(default)]
    pub from_me: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryBody {
    #[serde(default)]
    pub conversation: Option<String>,
    #[serde(default)]
    pub extended_text_message: Option<ExtendedText>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtendedText {
    #[serde(default)]
    pub text: Option<String>,
}

impl HistoryRecord {
    /// The record's text body, when it is a text message.
    pub fn text(&self) -> Option<&str> {
        let body = self.message.as_ref()?;
        body.conversation
            .as_deref()
            .or_else(|| body.extended_text_message.as_ref()?.text.as_deref())
    }
}

#[derive(Debug, Serialize)]
pub struct SendTextRequest<'a> {
    pub number: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendAudioRequest<'a> {
    pub number: &'a str,
    /// Base64-encoded audio bytes.
    pub audio: String,
    /// Milliseconds of simulated "recording" delay before delivery.
    pub delay: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted: Option<QuotedRef<'a>>,
}

#[derive(Debug, Serialize)]
pub struct QuotedRef<'a> {
    pub key: KeyRef<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_response_parses_nested_qrcode() {
        let body = r#"{"instance":{"instanceName":"bot","state":"connecting"},
            "qrcode":{"base64":"data:image/png;base64,AAA","code":"xyz"}}"#;
        let parsed: ConnectResponse = serde_json::from_str(body).unwrap();
        let qr = parsed.qrcode.unwrap();
        assert_eq!(qr.base64.as_deref(), Some("data:image/png;base64,AAA"));
        assert_eq!(parsed.instance.unwrap().state.as_deref(), Some("connecting"));
    }

    #[test]
    fn connect_response_parses_top_level_credential() {
        let body = r#"{"pairingCode":"ABCD-1234","count":1}"#;
        let parsed: ConnectResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.qrcode.is_none());
        assert_eq!(parsed.direct.pairing_code.as_deref(), Some("ABCD-1234"));
    }

    #[test]
    fn history_record_extracts_both_text_shapes() {
        let plain: HistoryRecord = serde_json::from_str(
            r#"{"key":{"fromMe":false},"message":{"conversation":"hi"},"messageTimestamp":1700000000}"#,
        )
        .unwrap();
        assert_eq!(plain.text(), Some("hi"));
        assert!(!plain.key.from_me);

        let extended: HistoryRecord = serde_json::from_str(
            r#"{"key":{"fromMe":true},"message":{"extendedTextMessage":{"text":"linked"}}}"#,
        )
        .unwrap();
        assert_eq!(extended.text(), Some("linked"));
        assert!(extended.key.from_me);
    }

    #[test]
    fn send_audio_request_omits_quoted_when_absent() {
        let req = SendAudioRequest {
            number: "551199",
            audio: "QUJD".into(),
            delay: 1200,
            quoted: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("quoted"));
    }
}
