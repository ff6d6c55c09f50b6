// SPDX-FileCopyrightText: 2026 VoxRelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the relay surface.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use voxrelay_core::{MessagingGateway, RelayError};
use voxrelay_pipeline::{Pipeline, RelayMetrics};

use crate::guard::ConnectionGuard;
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay counters, shared with the pipeline.
    pub metrics: Arc<RelayMetrics>,
    /// Single-slot setup guard and cached connection snapshot.
    pub guard: Arc<ConnectionGuard>,
    /// Messaging gateway for lifecycle calls (connect, status, disconnect).
    pub gateway: Arc<dyn MessagingGateway>,
    /// The message pipeline; webhook upserts are spawned onto it.
    pub pipeline: Pipeline,
}

impl AppState {
    pub fn new(gateway: Arc<dyn MessagingGateway>, pipeline: Pipeline) -> Self {
        Self {
            metrics: pipeline.metrics().clone(),
            guard: Arc::new(ConnectionGuard::new()),
            gateway,
            pipeline,
        }
    }
}

/// Build the relay router. Separate from [`start_server`] so tests can
/// drive it with `tower::ServiceExt::oneshot`.
pub fn build_router(state: AppState) -> Router {
    // Read-only surface: summary, session lifecycle, probes.
    let public_routes = Router::new()
        .route("/", get(handlers::get_dashboard))
        .route("/qrcode", get(handlers::get_qrcode))
        .route("/status", get(handlers::get_status))
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    // Mutating surface: event intake and operator actions.
    let action_routes = Router::new()
        .route("/webhook/evolution", post(handlers::post_webhook))
        .route("/disconnect", post(handlers::post_disconnect))
        .route("/admin/cleanup", post(handlers::post_cleanup))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(action_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve the relay until shutdown.
pub async fn start_server(
    host: &str,
    port: u16,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), RelayError> {
    let app = build_router(state);

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::Internal(format!("failed to bind relay to {addr}: {e}")))?;

    tracing::info!("Relay server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RelayError::Internal(format!("relay server error: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    use voxrelay_core::notify::ConsoleNotifier;
    use voxrelay_core::{
        ConnectOutcome, ConnectionStatus, ConversationTurn, InboundMessage, ReplyEngine,
        ScratchFile, SpeechSynth, Transcriber,
    };
    use voxrelay_pipeline::ResponseMode;

    use super::*;

    struct TestGateway {
        connect_outcome: Mutex<Option<ConnectOutcome>>,
        connect_calls: AtomicU32,
        connect_delay: Option<Duration>,
        status: Mutex<ConnectionStatus>,
        texts_sent: AtomicU32,
        deletes: AtomicU32,
    }

    impl Default for TestGateway {
        fn default() -> Self {
            Self {
                connect_outcome: Mutex::new(None),
                connect_calls: AtomicU32::new(0),
                connect_delay: None,
                status: Mutex::new(ConnectionStatus::Unknown),
                texts_sent: AtomicU32::new(0),
                deletes: AtomicU32::new(0),
            }
        }
    }

    impl TestGateway {
        fn with_outcome(outcome: ConnectOutcome) -> Self {
            Self {
                connect_outcome: Mutex::new(Some(outcome)),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl voxrelay_core::MessagingGateway for TestGateway {
        async fn create_or_connect(&self) -> Result<ConnectOutcome, voxrelay_core::RelayError> {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.connect_delay {
                tokio::time::sleep(delay).await;
            }
            let outcome = self.connect_outcome.lock().unwrap().clone();
            outcome.ok_or_else(|| voxrelay_core::RelayError::Gateway {
                message: "no session available".to_string(),
                status: None,
                source: None,
            })
        }

        async fn connection_state(&self) -> ConnectionStatus {
            *self.status.lock().unwrap()
        }

        async fn download_media(&self, _msg: &InboundMessage) -> Option<ScratchFile> {
            None
        }

        async fn fetch_history(
            &self,
            _number: &str,
            _limit: usize,
        ) -> Result<Vec<ConversationTurn>, voxrelay_core::RelayError> {
            Ok(Vec::new())
        }

        async fn send_text(&self, _number: &str, _text: &str) -> bool {
            self.texts_sent.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn send_audio(&self, _number: &str, _path: &Path, _quoted: Option<&str>) -> bool {
            true
        }

        async fn delete_instance(&self) -> Result<(), voxrelay_core::RelayError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct EchoTranscriber;

    #[async_trait]
    impl Transcriber for EchoTranscriber {
        async fn transcribe(&self, _path: &Path) -> Result<String, voxrelay_core::RelayError> {
            Ok("hello".to_string())
        }
    }

    struct CannedReply;

    #[async_trait]
    impl ReplyEngine for CannedReply {
        async fn generate(
            &self,
            _text: &str,
            _history: &[ConversationTurn],
        ) -> Result<String, voxrelay_core::RelayError> {
            Ok("Happy to help. What are you working on?".to_string())
        }
    }

    struct NoSynth;

    #[async_trait]
    impl SpeechSynth for NoSynth {
        async fn synthesize(&self, _text: &str) -> Option<Vec<u8>> {
            None
        }
    }

    fn state_with(gateway: Arc<TestGateway>) -> AppState {
        let pipeline = Pipeline::new(
            gateway.clone(),
            Arc::new(EchoTranscriber),
            Arc::new(CannedReply),
            Arc::new(NoSynth),
            Arc::new(ConsoleNotifier),
            Arc::new(RelayMetrics::new()),
            ResponseMode::Text,
            10,
        );
        AppState::new(gateway, pipeline)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn dashboard_reports_service_and_metrics() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["service"], "voxrelay");
        assert_eq!(json["connected"], false);
        assert_eq!(json["metrics"]["total_received"], 0);
    }

    #[tokio::test]
    async fn health_answers_from_cache_without_gateway_calls() {
        let gateway = Arc::new(TestGateway::default());
        let state = state_with(gateway.clone());
        state.guard.record_status(ConnectionStatus::Open);
        let app = build_router(state);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connected"], true);
        assert_eq!(gateway.connect_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn status_polls_gateway_and_updates_cache() {
        let gateway = Arc::new(TestGateway::default());
        *gateway.status.lock().unwrap() = ConnectionStatus::Open;
        let state = state_with(gateway);
        let app = build_router(state.clone());

        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["connection"], "open");
        assert_eq!(json["connected"], true);
        assert!(state.guard.cached().status.is_open());
    }

    #[tokio::test]
    async fn qrcode_returns_code_and_caches_it() {
        let gateway = Arc::new(TestGateway::with_outcome(ConnectOutcome::Qr(
            "base64-png".to_string(),
        )));
        let state = state_with(gateway);
        let app = build_router(state.clone());

        let response = app
            .oneshot(Request::get("/qrcode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "qrcode");
        assert_eq!(json["qrcode"], "base64-png");
        assert_eq!(state.guard.cached().qr.as_deref(), Some("base64-png"));
    }

    #[tokio::test]
    async fn qrcode_reports_already_connected() {
        let gateway = Arc::new(TestGateway::with_outcome(ConnectOutcome::AlreadyConnected));
        let state = state_with(gateway);
        let app = build_router(state.clone());

        let response = app
            .oneshot(Request::get("/qrcode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["status"], "connected");
        assert!(state.guard.cached().status.is_open());
    }

    #[tokio::test]
    async fn concurrent_qrcode_request_gets_202_immediately() {
        let gateway = Arc::new(TestGateway {
            connect_outcome: Mutex::new(Some(ConnectOutcome::Qr("qr".to_string()))),
            connect_delay: Some(Duration::from_secs(5)),
            status: Mutex::new(ConnectionStatus::Unknown),
            ..Default::default()
        });
        let state = state_with(gateway);
        let app = build_router(state);

        let first = {
            let app = app.clone();
            tokio::spawn(async move {
                app.oneshot(Request::get("/qrcode").body(Body::empty()).unwrap())
                    .await
                    .unwrap()
            })
        };
        // Let the first request take the setup slot.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = app
            .oneshot(Request::get("/qrcode").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::ACCEPTED);
        let json = body_json(second).await;
        assert_eq!(json["status"], "in_progress");

        first.abort();
    }

    #[tokio::test]
    async fn webhook_rejects_malformed_json() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state);

        let response = app
            .oneshot(post_json("/webhook/evolution", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("invalid webhook body"));
    }

    #[tokio::test]
    async fn webhook_rejects_upsert_with_invalid_data() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state);

        let body = r#"{"event": "messages.upsert", "data": {"key": 42}}"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn webhook_ignores_self_messages() {
        let state = state_with(Arc::new(TestGateway::default()));
        let metrics = state.metrics.clone();
        let app = build_router(state);

        let body = r#"{
            "event": "messages.upsert",
            "data": {
                "key": {"id": "MSG1", "remoteJid": "15551234@s.whatsapp.net", "fromMe": true},
                "message": {"conversation": "note to self"}
            }
        }"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ignored");
        assert_eq!(json["reason"], "self_message");
        assert_eq!(metrics.snapshot().total_received, 0);
    }

    #[tokio::test]
    async fn webhook_acks_unsupported_kinds_without_scheduling() {
        let state = state_with(Arc::new(TestGateway::default()));
        let metrics = state.metrics.clone();
        let app = build_router(state);

        let body = r#"{
            "event": "messages.upsert",
            "data": {
                "key": {"id": "MSG2", "remoteJid": "15551234@s.whatsapp.net", "fromMe": false},
                "message": {"imageMessage": {"url": "https://example.com/pic"}}
            }
        }"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["reason"], "unsupported_type");
        assert_eq!(metrics.snapshot().total_received, 0);
    }

    #[tokio::test]
    async fn webhook_schedules_pipeline_for_text_message() {
        let gateway = Arc::new(TestGateway::default());
        let state = state_with(gateway.clone());
        let metrics = state.metrics.clone();
        let app = build_router(state);

        let body = r#"{
            "event": "messages.upsert",
            "data": {
                "key": {"id": "MSG3", "remoteJid": "15551234@s.whatsapp.net", "fromMe": false},
                "message": {"conversation": "tell me about pricing"}
            }
        }"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "received");

        // The pipeline task runs detached; give it a moment to finish.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gateway.texts_sent.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().responses_sent, 1);
    }

    #[tokio::test]
    async fn webhook_connection_update_refreshes_cache() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state.clone());

        let body = r#"{"event": "connection.update", "data": {"state": "open"}}"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.guard.cached().status.is_open());
    }

    #[tokio::test]
    async fn webhook_qrcode_update_caches_code() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state.clone());

        let body = r#"{"event": "qrcode.updated", "data": {"qrcode": {"base64": "fresh-qr"}}}"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.guard.cached().qr.as_deref(), Some("fresh-qr"));
    }

    #[tokio::test]
    async fn webhook_unknown_event_is_acknowledged() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state);

        let body = r#"{"event": "contacts.update", "data": {}}"#;
        let response = app
            .oneshot(post_json("/webhook/evolution", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ignored");
    }

    #[tokio::test]
    async fn disconnect_deletes_instance_and_closes_cache() {
        let gateway = Arc::new(TestGateway::default());
        let state = state_with(gateway.clone());
        let app = build_router(state.clone());

        let response = app
            .oneshot(post_json("/disconnect", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(gateway.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(state.guard.cached().status, ConnectionStatus::Closed);
    }

    #[tokio::test]
    async fn cleanup_reports_removed_count() {
        let state = state_with(Arc::new(TestGateway::default()));
        let app = build_router(state);

        let response = app
            .oneshot(post_json("/admin/cleanup", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["removed"].is_number());
    }
}
