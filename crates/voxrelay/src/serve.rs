// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `voxrelay serve` command implementation.
//!
//! Wires the vendor clients into the message pipeline, builds the HTTP
//! surface, and serves until a shutdown signal arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use voxrelay_brain::{Brain, ChatClient, KeywordScopePolicy, SchedulingDetector};
use voxrelay_config::RelayConfig;
use voxrelay_core::notify::build_notifier;
use voxrelay_core::{scratch, MessagingGateway, RelayError};
use voxrelay_evolution::EvolutionClient;
use voxrelay_gateway::{start_server, AppState};
use voxrelay_pipeline::{Pipeline, RelayMetrics, ResponseMode};
use voxrelay_resilience::RetryPolicy;
use voxrelay_voice::{AzureRestSynth, EdgeSynth, SynthStrategy, Synthesizer};
use voxrelay_whisper::WhisperClient;

/// Scratch files older than this are leftovers from crashed tasks.
const STALE_SCRATCH_AGE: Duration = Duration::from_secs(3600);

/// Runs the `voxrelay serve` command.
pub async fn run_serve(config: RelayConfig) -> Result<(), RelayError> {
    init_tracing(&config.server.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        instance = %config.evolution.instance_name,
        "starting voxrelay serve"
    );

    // Clear out anything a previous run left behind.
    let removed = scratch::sweep_stale(STALE_SCRATCH_AGE).await;
    if removed > 0 {
        info!(removed, "removed stale scratch files from previous runs");
    }

    let download_timeout = Duration::from_secs(config.limits.download_timeout_secs);
    let inference_timeout = Duration::from_secs(config.limits.inference_timeout_secs);

    let max_audio_bytes = config.limits.max_audio_size_mb * 1024 * 1024;
    let gateway: Arc<dyn MessagingGateway> = Arc::new(EvolutionClient::new(
        config.evolution.base_url.clone(),
        &config.evolution.api_key,
        config.evolution.instance_name.clone(),
        download_timeout,
        max_audio_bytes,
    )?);

    let transcriber = WhisperClient::new(
        &config.whisper.api_key,
        config.whisper.base_url.clone(),
        config.whisper.model.clone(),
        config.whisper.language.clone(),
        inference_timeout,
        max_audio_bytes,
    )?;

    let chat = ChatClient::new(
        &config.llm.api_key,
        config.llm.base_url.clone(),
        config.llm.max_tokens,
        config.llm.temperature,
        inference_timeout,
    )?;
    let brain = Brain::new(
        chat,
        config.llm.primary_model.clone(),
        config.llm.fallback_model.clone(),
        Arc::new(KeywordScopePolicy::new()),
        config
            .relay
            .calendar_link
            .clone()
            .map(SchedulingDetector::new),
        RetryPolicy::vendor(),
    );

    let synth = build_synthesizer(&config, inference_timeout)?;
    info!(strategies = ?synth.strategy_names(), "speech synthesis chain ready");

    let notifier = build_notifier(
        &config.notification.sink,
        config.notification.file_path.clone().map(PathBuf::from),
    );

    let metrics = Arc::new(RelayMetrics::new());
    let pipeline = Pipeline::new(
        gateway.clone(),
        Arc::new(transcriber),
        Arc::new(brain),
        Arc::new(synth),
        notifier,
        metrics.clone(),
        ResponseMode::from_config(&config.relay.response_type),
        config.relay.history_limit,
    );

    let state = AppState::new(gateway, pipeline);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for shutdown signal");
            return;
        }
        info!("shutdown signal received");
    };

    start_server(&config.server.host, config.server.port, state, shutdown).await?;

    let snapshot = metrics.snapshot();
    info!(
        uptime_secs = snapshot.uptime_secs,
        total_received = snapshot.total_received,
        audio_processed = snapshot.audio_processed,
        responses_sent = snapshot.responses_sent,
        errors = snapshot.errors,
        "voxrelay stopped"
    );

    Ok(())
}

/// Builds the synthesis fallback chain: Azure token auth, Azure key auth
/// (both only when a subscription key is configured), then the keyless Edge
/// endpoint as the last resort.
fn build_synthesizer(
    config: &RelayConfig,
    timeout: Duration,
) -> Result<Synthesizer, RelayError> {
    let mut strategies: Vec<Box<dyn SynthStrategy>> = Vec::new();

    if let Some(key) = &config.tts.azure_key {
        strategies.push(Box::new(AzureRestSynth::with_token_auth(
            key.clone(),
            &config.tts.azure_region,
            config.tts.azure_voice.clone(),
            timeout,
        )?));
        strategies.push(Box::new(AzureRestSynth::with_key_auth(
            key.clone(),
            &config.tts.azure_region,
            config.tts.azure_voice.clone(),
            timeout,
        )?));
    }
    strategies.push(Box::new(EdgeSynth::new(config.tts.edge_voice.clone())));

    Ok(Synthesizer::new(strategies))
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("voxrelay={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(toml: &str) -> RelayConfig {
        voxrelay_config::load_and_validate_str(toml).expect("valid config")
    }

    const BASE: &str = r#"
[evolution]
api_key = "evo-key"

[llm]
api_key = "llm-key"

[whisper]
api_key = "stt-key"
"#;

    #[test]
    fn synth_chain_without_azure_key_is_edge_only() {
        let config = config_from(BASE);
        let synth = build_synthesizer(&config, Duration::from_secs(30)).unwrap();
        assert_eq!(synth.strategy_names(), vec!["edge"]);
    }

    #[test]
    fn synth_chain_with_azure_key_tries_azure_first() {
        let toml = format!(
            "{BASE}
[tts]
azure_key = \"azure-secret\"
azure_region = \"westeurope\"
"
        );
        let config = config_from(&toml);
        let synth = build_synthesizer(&config, Duration::from_secs(30)).unwrap();
        assert_eq!(
            synth.strategy_names(),
            vec!["azure-token", "azure-key", "edge"]
        );
    }
}
