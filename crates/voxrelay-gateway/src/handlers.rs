// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the relay gateway.
//!
//! Request/response bodies live here as serde structs so tests can assert
//! on exact shapes. All handlers take the shared [`AppState`] and return
//! axum responses.

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use voxrelay_core::{ConnectOutcome, MessageKind};
use voxrelay_evolution::{WebhookEnvelope, WebhookEvent};
use voxrelay_pipeline::MetricsSnapshot;
use voxrelay_resilience::{is_transient, retry, RetryPolicy};

use crate::server::AppState;

/// How old a scratch file must be before `/admin/cleanup` removes it.
const STALE_SCRATCH_AGE: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// GET / response: service summary.
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub service: String,
    pub version: String,
    pub status: String,
    pub connected: bool,
    pub metrics: MetricsSnapshot,
}

/// GET /qrcode response.
#[derive(Debug, Serialize)]
pub struct QrcodeResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pairing_code: Option<String>,
}

/// GET /status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connection: String,
    pub connected: bool,
}

/// GET /health response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub connected: bool,
    pub metrics: MetricsSnapshot,
}

/// POST /webhook/evolution acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    fn received() -> Self {
        Self {
            status: "received".to_string(),
            reason: None,
        }
    }

    fn ignored(reason: &str) -> Self {
        Self {
            status: "ignored".to_string(),
            reason: Some(reason.to_string()),
        }
    }
}

/// POST /admin/cleanup response.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

/// GET /
///
/// Service summary from cached state; never touches the gateway.
pub async fn get_dashboard(State(state): State<AppState>) -> Json<DashboardResponse> {
    let cached = state.guard.cached();
    Json(DashboardResponse {
        service: "voxrelay".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: cached.status.to_string(),
        connected: cached.status.is_open(),
        metrics: state.metrics.snapshot(),
    })
}

/// GET /qrcode
///
/// Runs the create-or-connect flow under the single-slot guard. A second
/// caller while one flow is in flight gets 202 immediately instead of a
/// duplicate instance request.
pub async fn get_qrcode(State(state): State<AppState>) -> Response {
    let _slot = match state.guard.try_begin_setup() {
        Ok(slot) => slot,
        Err(_) => {
            return (
                StatusCode::ACCEPTED,
                Json(QrcodeResponse {
                    status: "in_progress".to_string(),
                    qrcode: None,
                    pairing_code: None,
                }),
            )
                .into_response();
        }
    };

    let gateway = state.gateway.clone();
    let outcome = retry(
        RetryPolicy::connect(),
        "create_or_connect",
        || gateway.create_or_connect(),
        is_transient,
    )
    .await;

    match outcome {
        Ok(ConnectOutcome::Qr(base64)) => {
            state.guard.record_qr(Some(base64.clone()));
            Json(QrcodeResponse {
                status: "qrcode".to_string(),
                qrcode: Some(base64),
                pairing_code: None,
            })
            .into_response()
        }
        Ok(ConnectOutcome::PairingCode(code)) => {
            state.guard.record_qr(None);
            Json(QrcodeResponse {
                status: "pairing_code".to_string(),
                qrcode: None,
                pairing_code: Some(code),
            })
            .into_response()
        }
        Ok(ConnectOutcome::AlreadyConnected) => {
            state.guard.record_status(voxrelay_core::ConnectionStatus::Open);
            Json(QrcodeResponse {
                status: "connected".to_string(),
                qrcode: None,
                pairing_code: None,
            })
            .into_response()
        }
        Ok(ConnectOutcome::NotReady) => (
            StatusCode::ACCEPTED,
            Json(QrcodeResponse {
                status: "not_ready".to_string(),
                qrcode: None,
                pairing_code: None,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: format!("session setup failed: {e}"),
            }),
        )
            .into_response(),
    }
}

/// GET /status
///
/// Polls the gateway for the live connection state and refreshes the cache.
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.gateway.connection_state().await;
    state.guard.record_status(status);
    Json(StatusResponse {
        connection: status.to_string(),
        connected: status.is_open(),
    })
}

/// GET /health
///
/// Liveness probe. Answers from the cached snapshot only, so it stays fast
/// and dependable even when the gateway is down.
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let cached = state.guard.cached();
    Json(HealthResponse {
        status: "ok".to_string(),
        connected: cached.status.is_open(),
        metrics: state.metrics.snapshot(),
    })
}

/// POST /webhook/evolution
///
/// Event intake. Message upserts are handed to the pipeline as a background
/// task so the webhook always acknowledges quickly; lifecycle events update
/// the cached connection snapshot.
pub async fn post_webhook(
    State(state): State<AppState>,
    envelope: Result<Json<WebhookEnvelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match envelope {
        Ok(envelope) => envelope,
        Err(rejection) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: format!("invalid webhook body: {rejection}"),
                }),
            )
                .into_response();
        }
    };

    let event = match envelope.parse() {
        Ok(event) => event,
        Err(e) => {
            warn!(event = %e.event, detail = %e.detail, "webhook event failed to decode");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: format!("invalid {} payload: {}", e.event, e.detail),
                }),
            )
                .into_response();
        }
    };

    match event {
        WebhookEvent::MessageUpsert(msg) => {
            if msg.from_me {
                return Json(WebhookAck::ignored("self_message")).into_response();
            }
            if let MessageKind::Unsupported { message_type } = &msg.kind {
                info!(message_type = %message_type, "acknowledging unsupported message kind");
                return Json(WebhookAck::ignored("unsupported_type")).into_response();
            }
            state.pipeline.spawn(msg);
            Json(WebhookAck::received()).into_response()
        }
        WebhookEvent::QrcodeUpdated { base64 } => {
            state.guard.record_qr(base64);
            Json(WebhookAck::received()).into_response()
        }
        WebhookEvent::ConnectionUpdate { state: conn_state } => {
            let status = voxrelay_core::ConnectionStatus::from_gateway(&conn_state);
            info!(connection = %status, "connection state changed");
            state.guard.record_status(status);
            Json(WebhookAck::received()).into_response()
        }
        WebhookEvent::Unhandled { event } => {
            Json(WebhookAck::ignored(&format!("unhandled_event:{event}"))).into_response()
        }
    }
}

/// POST /disconnect
///
/// Tears down the gateway instance. This is the only path that deletes an
/// instance; session setup never does.
pub async fn post_disconnect(State(state): State<AppState>) -> Response {
    match state.gateway.delete_instance().await {
        Ok(()) => {
            state
                .guard
                .record_status(voxrelay_core::ConnectionStatus::Closed);
            Json(WebhookAck {
                status: "disconnected".to_string(),
                reason: None,
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::BAD_GATEWAY,
            Json(ErrorResponse {
                error: format!("disconnect failed: {e}"),
            }),
        )
            .into_response(),
    }
}

/// POST /admin/cleanup
///
/// Removes scratch files older than an hour, catching anything a crashed
/// pipeline task left behind.
pub async fn post_cleanup(State(_state): State<AppState>) -> Json<CleanupResponse> {
    let removed = voxrelay_core::scratch::sweep_stale(STALE_SCRATCH_AGE).await;
    if removed > 0 {
        info!(removed, "removed stale scratch files");
    }
    Json(CleanupResponse { removed })
}
