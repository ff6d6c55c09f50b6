// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Azure Cognitive Services speech synthesis over REST.
//!
//! Two authentication flavors share the SSML request: the token strategy
//! exchanges the subscription key for a short-lived bearer token first, the
//! key strategy sends the subscription key directly. Both produce
//! opus-in-ogg, which WhatsApp plays as a native voice note.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use voxrelay_core::RelayError;

use crate::{escape_ssml, SynthStrategy};

/// Voice-note friendly output format.
const OUTPUT_FORMAT: &str = "ogg-24khz-16bit-mono-opus";

const USER_AGENT: &str = "voxrelay";

#[derive(Debug, Clone)]
enum AzureAuth {
    /// Exchange the key for a bearer token per request.
    Token,
    /// Send the subscription key on the synthesis request itself.
    Key,
}

/// Azure REST synthesis strategy.
#[derive(Debug, Clone)]
pub struct AzureRestSynth {
    client: reqwest::Client,
    key: String,
    voice: String,
    token_url: String,
    tts_url: String,
    auth: AzureAuth,
}

impl AzureRestSynth {
    /// Token-auth strategy for the given region and subscription key.
    pub fn with_token_auth(
        key: String,
        region: &str,
        voice: String,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        Self::build(key, region, voice, timeout, AzureAuth::Token)
    }

    /// Key-auth strategy, skipping the token round-trip.
    pub fn with_key_auth(
        key: String,
        region: &str,
        voice: String,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        Self::build(key, region, voice, timeout, AzureAuth::Key)
    }

    fn build(
        key: String,
        region: &str,
        voice: String,
        timeout: Duration,
        auth: AzureAuth,
    ) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Synthesis {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            key,
            voice,
            token_url: format!("https://{region}.api.cognitive.microsoft.com/sts/v1.0/issueToken"),
            tts_url: format!("https://{region}.tts.speech.microsoft.com/cognitiveservices/v1"),
            auth,
        })
    }

    /// Overrides the endpoint URLs (for testing with wiremock).
    #[cfg(test)]
    pub fn with_urls(mut self, token_url: String, tts_url: String) -> Self {
        self.token_url = token_url;
        self.tts_url = tts_url;
        self
    }

    fn ssml(&self, text: &str) -> String {
        let lang = self
            .voice
            .splitn(3, '-')
            .take(2)
            .collect::<Vec<_>>()
            .join("-");
        format!(
            "<speak version='1.0' xml:lang='{lang}'><voice name='{}'>{}</voice></speak>",
            self.voice,
            escape_ssml(text)
        )
    }

    async fn fetch_token(&self) -> Result<String, RelayError> {
        let response = self
            .client
            .post(&self.token_url)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("content-length", "0")
            .send()
            .await
            .map_err(|e| RelayError::Synthesis {
                message: format!("token request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Synthesis {
                message: format!("token request returned {status}"),
                source: None,
            });
        }

        response.text().await.map_err(|e| RelayError::Synthesis {
            message: format!("failed to read token: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[async_trait]
impl SynthStrategy for AzureRestSynth {
    fn name(&self) -> &'static str {
        match self.auth {
            AzureAuth::Token => "azure-token",
            AzureAuth::Key => "azure-key",
        }
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, RelayError> {
        let mut request = self
            .client
            .post(&self.tts_url)
            .header("content-type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("user-agent", USER_AGENT)
            .body(self.ssml(text));

        request = match self.auth {
            AzureAuth::Token => {
                let token = self.fetch_token().await?;
                request.header("authorization", format!("Bearer {token}"))
            }
            AzureAuth::Key => request.header("Ocp-Apim-Subscription-Key", &self.key),
        };

        let response = request.send().await.map_err(|e| RelayError::Synthesis {
            message: format!("synthesis request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::Synthesis {
                message: format!("synthesis returned {status}: {body}"),
                source: None,
            });
        }

        let bytes = response.bytes().await.map_err(|e| RelayError::Synthesis {
            message: format!("failed to read audio body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if bytes.is_empty() {
            return Err(RelayError::Synthesis {
                message: "synthesis returned an empty body".into(),
                source: None,
            });
        }

        debug!(strategy = self.name(), size = bytes.len(), "synthesis complete");
        Ok(bytes.to_vec())
    }
}
