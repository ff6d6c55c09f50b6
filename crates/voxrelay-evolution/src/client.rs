// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Evolution API messaging gateway.
//!
//! Provides [`EvolutionClient`], which handles instance lifecycle, media
//! download, history lookup, and message delivery. Delivery methods report
//! success as a bool: the pipeline treats a failed send as a counted error,
//! not an exception.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use tracing::{debug, info, warn};
use voxrelay_core::{
    ConnectOutcome, ConnectionStatus, ConversationTurn, InboundMessage, MessageKind,
    MessagingGateway, RelayError, ScratchFile,
};

use crate::wire::{
    ConnectResponse, ConnectionStateResponse, CreateInstanceRequest, FindMessagesKey,
    FindMessagesRequest, FindMessagesResponse, FindMessagesWhere, KeyRef, MediaMessageRef,
    MediaRequest, MediaResponse, QuotedRef, SendAudioRequest, SendTextRequest,
};

/// Baileys is the only integration the relay drives.
const INTEGRATION: &str = "WHATSAPP-BAILEYS";

/// Milliseconds of simulated "recording..." presence before a voice note is
/// delivered, so replies do not land unnaturally fast.
const AUDIO_SEND_DELAY_MS: u64 = 1200;

/// HTTP client for Evolution API communication.
#[derive(Debug, Clone)]
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    instance: String,
    max_media_bytes: u64,
}

impl EvolutionClient {
    /// Creates a new gateway client.
    ///
    /// # Arguments
    /// * `base_url` - Evolution API server URL, no trailing slash required
    /// * `api_key` - global API key, sent as the `apikey` header
    /// * `instance` - WhatsApp instance name to manage
    /// * `timeout` - per-request timeout (media downloads are the slow path)
    /// * `max_media_bytes` - decoded media payloads above this are rejected
    pub fn new(
        base_url: String,
        api_key: &str,
        instance: String,
        timeout: Duration,
        max_media_bytes: u64,
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key)
                .map_err(|e| RelayError::Config(format!("invalid gateway API key: {e}")))?,
        );
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Gateway {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            instance,
            max_media_bytes,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Normalizes a create/connect response body into a [`ConnectOutcome`].
    fn outcome_from(body: ConnectResponse) -> ConnectOutcome {
        let credential = match body.qrcode {
            Some(qr) if !qr.is_empty() => qr,
            _ => body.direct,
        };
        if let Some(base64) = credential.base64 {
            return ConnectOutcome::Qr(base64);
        }
        if let Some(code) = credential.pairing_code.or(credential.code) {
            return ConnectOutcome::PairingCode(code);
        }
        match body.instance.and_then(|i| i.state) {
            Some(state) if state == "open" => ConnectOutcome::AlreadyConnected,
            _ => ConnectOutcome::NotReady,
        }
    }

    /// Connects an already-provisioned instance.
    async fn connect_existing(&self) -> Result<ConnectOutcome, RelayError> {
        let url = self.url(&format!("/instance/connect/{}", self.instance));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Gateway {
                message: format!("connect request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Gateway {
                message: format!("connect returned {status}: {body}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let body: ConnectResponse = response.json().await.map_err(|e| RelayError::Gateway {
            message: format!("failed to parse connect response: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })?;
        Ok(Self::outcome_from(body))
    }
}

#[async_trait]
impl MessagingGateway for EvolutionClient {
    /// Creates the instance, falling back to connecting it when the gateway
    /// reports a name conflict. A conflict means the instance survived a
    /// relay restart and must be reused, never deleted.
    async fn create_or_connect(&self) -> Result<ConnectOutcome, RelayError> {
        let request = CreateInstanceRequest {
            instance_name: &self.instance,
            qrcode: true,
            integration: INTEGRATION,
        };

        let response = self
            .client
            .post(self.url("/instance/create"))
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Gateway {
                message: format!("create request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, instance = %self.instance, "instance create response");

        if status == StatusCode::CONFLICT {
            info!(instance = %self.instance, "instance already exists, connecting");
            return self.connect_existing().await;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Gateway {
                message: format!("instance create returned {status}: {body}"),
                status: Some(status.as_u16()),
                source: None,
            });
        }

        let body: ConnectResponse = response.json().await.map_err(|e| RelayError::Gateway {
            message: format!("failed to parse create response: {e}"),
            status: None,
            source: Some(Box::new(e)),
        })?;
        Ok(Self::outcome_from(body))
    }

    async fn connection_state(&self) -> ConnectionStatus {
        let url = self.url(&format!("/instance/connectionState/{}", self.instance));
        let result = async {
            let response = self.client.get(&url).send().await?;
            response.json::<ConnectionStateResponse>().await
        }
        .await;

        match result {
            Ok(body) => {
                let state = body.instance.and_then(|i| i.state).unwrap_or_default();
                ConnectionStatus::from_gateway(&state)
            }
            Err(e) => {
                warn!(error = %e, "connection state check failed");
                ConnectionStatus::Unknown
            }
        }
    }

    async fn download_media(&self, msg: &InboundMessage) -> Option<ScratchFile> {
        let extension = match &msg.kind {
            MessageKind::Audio { mime_type, .. } => extension_for_mime(mime_type),
            _ => {
                warn!(message_id = %msg.id, "download requested for non-audio message");
                return None;
            }
        };

        let url = self.url(&format!(
            "/chat/getBase64FromMediaMessage/{}",
            self.instance
        ));
        let request = MediaRequest {
            message: MediaMessageRef {
                key: KeyRef { id: &msg.id },
            },
            convert_to_mp4: false,
        };

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "media download request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            warn!(message_id = %msg.id, status = %response.status(), "media download rejected");
            return None;
        }

        let body: MediaResponse = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "failed to parse media response");
                return None;
            }
        };

        // Some gateway versions return a data URL, some raw base64.
        let encoded = body
            .base64
            .rsplit_once("base64,")
            .map(|(_, data)| data.to_string())
            .unwrap_or(body.base64);

        let encoded = encoded.trim();
        // Base64 inflates by 4/3; reject obviously oversized payloads
        // before decoding, then the exact size after.
        if encoded.len() as u64 / 4 * 3 > self.max_media_bytes {
            warn!(
                message_id = %msg.id,
                encoded_len = encoded.len(),
                max = self.max_media_bytes,
                "media payload exceeds size limit"
            );
            return None;
        }

        let bytes = match base64::engine::general_purpose::STANDARD.decode(encoded) {
            Ok(b) => b,
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "media payload is not valid base64");
                return None;
            }
        };

        if bytes.len() as u64 > self.max_media_bytes {
            warn!(
                message_id = %msg.id,
                size = bytes.len(),
                max = self.max_media_bytes,
                "media payload exceeds size limit"
            );
            return None;
        }

        debug!(message_id = %msg.id, size = bytes.len(), "downloaded media");
        match ScratchFile::with_bytes(extension, &bytes).await {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(message_id = %msg.id, error = %e, "failed to write media to scratch file");
                None
            }
        }
    }

    async fn fetch_history(
        &self,
        remote_jid: &str,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RelayError> {
        let url = self.url(&format!("/chat/findMessages/{}", self.instance));
        let request = FindMessagesRequest {
            r#where: FindMessagesWhere {
                key: FindMessagesKey { remote_jid },
            },
            limit,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Gateway {
                message: format!("history request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        if !response.status().is_success() {
            return Err(RelayError::Gateway {
                message: format!("history request returned {}", response.status()),
                status: Some(response.status().as_u16()),
                source: None,
            });
        }

        let body: FindMessagesResponse =
            response.json().await.map_err(|e| RelayError::Gateway {
                message: format!("failed to parse history response: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let mut records = body.messages.records;
        records.sort_by_key(|r| r.message_timestamp.unwrap_or(0));

        let turns: Vec<ConversationTurn> = records
            .iter()
            .filter_map(|record| {
                let text = record.text()?;
                let timestamp = record
                    .message_timestamp
                    .and_then(|t| chrono::DateTime::from_timestamp(t, 0))
                    .unwrap_or_else(chrono::Utc::now);
                Some(ConversationTurn {
                    from_bot: record.key.from_me,
                    text: text.to_string(),
                    timestamp,
                })
            })
            .collect();

        let skip = turns.len().saturating_sub(limit);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn send_text(&self, to: &str, text: &str) -> bool {
        let url = self.url(&format!("/message/sendText/{}", self.instance));
        let request = SendTextRequest { number: to, text };

        match self.client.post(&url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(to, "text message sent");
                true
            }
            Ok(response) => {
                warn!(to, status = %response.status(), "text send rejected");
                false
            }
            Err(e) => {
                warn!(to, error = %e, "text send failed");
                false
            }
        }
    }

    async fn send_audio(&self, to: &str, audio: &Path, quoted: Option<&str>) -> bool {
        let bytes = match tokio::fs::read(audio).await {
            Ok(b) => b,
            Err(e) => {
                warn!(to, path = %audio.display(), error = %e, "failed to read audio file");
                return false;
            }
        };

        let url = self.url(&format!("/message/sendWhatsAppAudio/{}", self.instance));
        let request = SendAudioRequest {
            number: to,
            audio: base64::engine::general_purpose::STANDARD.encode(&bytes),
            delay: AUDIO_SEND_DELAY_MS,
            quoted: quoted.map(|id| QuotedRef {
                key: KeyRef { id },
            }),
        };

        match self.client.post(&url).json(&request).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(to, size = bytes.len(), "voice note sent");
                true
            }
            Ok(response) => {
                warn!(to, status = %response.status(), "voice note send rejected");
                false
            }
            Err(e) => {
                warn!(to, error = %e, "voice note send failed");
                false
            }
        }
    }

    async fn delete_instance(&self) -> Result<(), RelayError> {
        let url = self.url(&format!("/instance/delete/{}", self.instance));
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| RelayError::Gateway {
                message: format!("delete request failed: {e}"),
                status: None,
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            info!(instance = %self.instance, "instance deleted");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RelayError::Gateway {
                message: format!("instance delete returned {status}: {body}"),
                status: Some(status.as_u16()),
                source: None,
            })
        }
    }
}

/// File extension for a WhatsApp audio mime type.
fn extension_for_mime(mime: &str) -> &'static str {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/wav" | "audio/x-wav" => "wav",
        // WhatsApp voice notes are ogg/opus.
        _ => "ogg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> EvolutionClient {
        test_client_with_limit(base_url, 16 * 1024 * 1024)
    }

    fn test_client_with_limit(base_url: &str, max_media_bytes: u64) -> EvolutionClient {
        EvolutionClient::new(
            base_url.to_string(),
            "test-api-key",
            "sales-bot".into(),
            Duration::from_secs(5),
            max_media_bytes,
        )
        .unwrap()
    }

    fn audio_message() -> InboundMessage {
        InboundMessage {
            id: "MSG123".into(),
            remote_jid: "5511999999999@s.whatsapp.net".into(),
            from_me: false,
            push_name: Some("Ana".into()),
            kind: MessageKind::Audio {
                url: "https://mmg.whatsapp.net/x".into(),
                mime_type: "audio/ogg; codecs=opus".into(),
                seconds: Some(7),
            },
        }
    }

    #[tokio::test]
    async fn create_returns_qr_code() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .and(header("apikey", "test-api-key"))
            .and(body_partial_json(serde_json::json!({
                "instanceName": "sales-bot",
                "qrcode": true,
                "integration": "WHATSAPP-BAILEYS",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "instance": {"instanceName": "sales-bot", "state": "connecting"},
                "qrcode": {"base64": "data:image/png;base64,QR", "code": "raw"},
            })))
            .mount(&server)
            .await;

        let outcome = test_client(&server.uri()).create_or_connect().await.unwrap();
        assert_eq!(
            outcome,
            ConnectOutcome::Qr("data:image/png;base64,QR".into())
        );
    }

    #[tokio::test]
    async fn conflict_connects_and_never_deletes() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
                "status": 409,
                "error": "Conflict",
                "response": {"message": ["Instance already exists"]},
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/instance/connect/sales-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "pairingCode": "WZYEH1YY",
                "count": 1,
            })))
            .mount(&server)
            .await;

        // A conflict must never trigger teardown of the existing session.
        Mock::given(method("DELETE"))
            .and(path("/instance/delete/sales-bot"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = test_client(&server.uri()).create_or_connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::PairingCode("WZYEH1YY".into()));
    }

    #[tokio::test]
    async fn create_on_open_instance_reports_already_connected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/instance/create"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/instance/connect/sales-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance": {"state": "open"},
            })))
            .mount(&server)
            .await;

        let outcome = test_client(&server.uri()).create_or_connect().await.unwrap();
        assert_eq!(outcome, ConnectOutcome::AlreadyConnected);
    }

    #[tokio::test]
    async fn connection_state_parses_open() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instance/connectionState/sales-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "instance": {"instanceName": "sales-bot", "state": "open"},
            })))
            .mount(&server)
            .await;

        let status = test_client(&server.uri()).connection_state().await;
        assert_eq!(status, ConnectionStatus::Open);
    }

    #[tokio::test]
    async fn connection_state_soft_fails_to_unknown() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/instance/connectionState/sales-bot"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let status = test_client(&server.uri()).connection_state().await;
        assert_eq!(status, ConnectionStatus::Unknown);
    }

    #[tokio::test]
    async fn download_media_decodes_data_url() {
        let server = MockServer::start().await;

        // "voice note" base64-encoded.
        Mock::given(method("POST"))
            .and(path("/chat/getBase64FromMediaMessage/sales-bot"))
            .and(body_partial_json(serde_json::json!({
                "message": {"key": {"id": "MSG123"}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "base64": "data:audio/ogg;base64,dm9pY2Ugbm90ZQ==",
            })))
            .mount(&server)
            .await;

        let file = test_client(&server.uri())
            .download_media(&audio_message())
            .await
            .expect("should download");
        let bytes = tokio::fs::read(file.path()).await.unwrap();
        assert_eq!(bytes, b"voice note");
        assert_eq!(file.path().extension().unwrap(), "ogg");
    }

    #[tokio::test]
    async fn download_media_returns_none_on_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/getBase64FromMediaMessage/sales-bot"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = test_client(&server.uri()).download_media(&audio_message()).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn download_media_rejects_oversized_payload() {
        let server = MockServer::start().await;

        // 64 bytes of audio against an 8-byte limit.
        let encoded = base64::engine::general_purpose::STANDARD.encode([0u8; 64]);
        Mock::given(method("POST"))
            .and(path("/chat/getBase64FromMediaMessage/sales-bot"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"base64": encoded})),
            )
            .mount(&server)
            .await;

        let result = test_client_with_limit(&server.uri(), 8)
            .download_media(&audio_message())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fetch_history_orders_oldest_first() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/findMessages/sales-bot"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": {"total": 3, "records": [
                    {"key": {"fromMe": true}, "message": {"conversation": "second"},
                     "messageTimestamp": 1700000100},
                    {"key": {"fromMe": false}, "message": {"conversation": "first"},
                     "messageTimestamp": 1700000000},
                    {"key": {"fromMe": false},
                     "message": {"extendedTextMessage": {"text": "third"}},
                     "messageTimestamp": 1700000200},
                ]},
            })))
            .mount(&server)
            .await;

        let turns = test_client(&server.uri())
            .fetch_history("5511999999999@s.whatsapp.net", 10)
            .await
            .unwrap();
        let texts: Vec<&str> = turns.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
        assert!(turns[1].from_bot);
        assert!(!turns[0].from_bot);
    }

    #[tokio::test]
    async fn send_text_reports_failure_as_false() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/message/sendText/sales-bot"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ok = test_client(&server.uri())
            .send_text("5511999999999", "hello")
            .await;
        assert!(!ok);
    }

    #[tokio::test]
    async fn send_audio_encodes_file_and_quotes_original() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/message/sendWhatsAppAudio/sales-bot"))
            .and(body_partial_json(serde_json::json!({
                "number": "5511999999999",
                "audio": "cmVwbHk=",
                "delay": 1200,
                "quoted": {"key": {"id": "MSG123"}},
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "key": {"id": "SENT1"},
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let audio_path = dir.path().join("reply.mp3");
        tokio::fs::write(&audio_path, b"reply").await.unwrap();

        let ok = test_client(&server.uri())
            .send_audio("5511999999999", &audio_path, Some("MSG123"))
            .await;
        assert!(ok);
    }

    #[test]
    fn extension_covers_common_mimes() {
        assert_eq!(extension_for_mime("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for_mime("audio/mpeg"), "mp3");
        assert_eq!(extension_for_mime("audio/mp4"), "m4a");
        assert_eq!(extension_for_mime("application/octet-stream"), "ogg");
    }
}
