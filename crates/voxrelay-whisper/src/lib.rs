// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Speech-to-text over an OpenAI-compatible Whisper endpoint.
//!
//! [`WhisperClient`] uploads an audio file as multipart form data to
//! `/audio/transcriptions` and returns the transcript. Retry lives at the
//! call site via `voxrelay-resilience`; the client makes exactly one attempt.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, warn};
use voxrelay_core::{RelayError, Transcriber};

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// HTTP client for Whisper-compatible transcription.
#[derive(Debug, Clone)]
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    language: String,
    max_bytes: u64,
}

impl WhisperClient {
    /// Creates a new transcription client.
    ///
    /// `max_bytes` caps the audio size accepted for upload; larger files are
    /// rejected locally before spending vendor quota.
    pub fn new(
        api_key: &str,
        base_url: String,
        model: String,
        language: String,
        timeout: Duration,
        max_bytes: u64,
    ) -> Result<Self, RelayError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {api_key}");
        headers.insert(
            "authorization",
            HeaderValue::from_str(&auth)
                .map_err(|e| RelayError::Config(format!("invalid transcription API key: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Transcription {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            language,
            max_bytes,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &Path) -> Result<String, RelayError> {
        let metadata = tokio::fs::metadata(audio).await?;
        if metadata.len() > self.max_bytes {
            warn!(
                path = %audio.display(),
                size = metadata.len(),
                max = self.max_bytes,
                "audio file exceeds transcription size limit"
            );
            return Err(RelayError::Transcription {
                message: format!(
                    "audio file is {} bytes, limit is {}",
                    metadata.len(),
                    self.max_bytes
                ),
                source: None,
            });
        }

        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.ogg".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| RelayError::Transcription {
                message: format!("failed to build multipart body: {e}"),
                source: Some(Box::new(e)),
            })?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json");

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RelayError::Transcription {
                message: format!("transcription request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Transcription {
                message: format!("transcription returned {status}: {body}"),
                source: None,
            });
        }

        let body: TranscriptionResponse =
            response.json().await.map_err(|e| RelayError::Transcription {
                message: format!("failed to parse transcription response: {e}"),
                source: Some(Box::new(e)),
            })?;

        let text = body.text.trim().to_string();
        debug!(chars = text.len(), "transcription complete");
        Ok(text)
    }
}
