//! Control server
//!
//! One axum router: the `/task` WebSocket carries the command channel
//! (a JSON batch of messages in, one tagged response per affected task
//! out), `/health` summarizes pool and task state, `/metrics` renders the
//! Prometheus exposition. A single control client is admitted at a time;
//! a second upgrade attempt is refused while the first is connected.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{info, warn};

use checkout::{Message, Response as CommandResponse, Supervisor};
use proxy_pool::ProxyPool;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub pool: Arc<ProxyPool>,
    pub prometheus: PrometheusHandle,
    /// One permit: the control channel admits a single client.
    pub control_slot: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        supervisor: Arc<Supervisor>,
        pool: Arc<ProxyPool>,
        prometheus: PrometheusHandle,
    ) -> Self {
        Self {
            supervisor,
            pool,
            prometheus,
            control_slot: Arc::new(Semaphore::new(1)),
        }
    }
}

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState, max_connections: usize) -> Router {
    Router::new()
        .route("/task", get(task_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

/// Upgrade to the control WebSocket, if no other client holds the slot.
async fn task_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    match state.control_slot.clone().try_acquire_owned() {
        Ok(permit) => {
            let supervisor = state.supervisor.clone();
            ws.on_upgrade(move |socket| control_session(socket, supervisor, permit))
        }
        Err(_) => {
            warn!("control channel busy, refusing second client");
            StatusCode::CONFLICT.into_response()
        }
    }
}

async fn control_session(
    mut socket: WebSocket,
    supervisor: Arc<Supervisor>,
    _permit: OwnedSemaphorePermit,
) {
    info!("control client connected");
    while let Some(received) = socket.recv().await {
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "control socket error");
                break;
            }
        };
        match message {
            WsMessage::Text(text) => {
                let reply = process_batch(&supervisor, text.as_str()).await;
                if socket.send(WsMessage::Text(reply.into())).await.is_err() {
                    break;
                }
            }
            WsMessage::Close(_) => break,
            // Pings are answered by axum; binary frames are not part of
            // the protocol.
            _ => {}
        }
    }
    info!("control client disconnected");
}

/// Decode one inbound control payload and dispatch it.
///
/// The payload is a JSON array of messages; a bare object is accepted as a
/// batch of one. Anything else yields a single InvalidMessage response —
/// the channel never goes silent on bad input.
pub(crate) async fn process_batch(supervisor: &Supervisor, text: &str) -> String {
    let messages: Vec<Message> = match serde_json::from_str(text) {
        Ok(batch) => batch,
        Err(_) => match serde_json::from_str::<Message>(text) {
            Ok(single) => vec![single],
            Err(e) => {
                warn!(error = %e, "invalid control payload");
                crate::metrics::record_invalid_payload();
                return encode(&[CommandResponse::invalid("")]);
            }
        },
    };

    crate::metrics::record_batch(messages.len());
    let responses = supervisor.dispatch(messages).await;
    encode(&responses)
}

fn encode(responses: &[CommandResponse]) -> String {
    serde_json::to_string(responses).unwrap_or_else(|_| "[]".to_string())
}

/// Health endpoint: pool and task summaries in one document.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "ok",
        "pool": state.pool.health().await,
        "tasks": state.supervisor.health().await,
    });
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint — text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use checkout::ResponseKind;
    use proxy_pool::ProxyEndpoint;
    use tower::ServiceExt;

    /// PrometheusHandle for tests without installing the global recorder.
    fn test_prometheus_handle() -> PrometheusHandle {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle()
    }

    fn test_state() -> AppState {
        let endpoints: Vec<ProxyEndpoint> =
            vec![ProxyEndpoint::new("10.0.0.1", 8080, None)];
        AppState::new(
            Arc::new(Supervisor::new()),
            Arc::new(ProxyPool::new(endpoints)),
            test_prometheus_handle(),
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_pool_and_tasks() {
        let app = build_router(test_state(), 8);

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["pool"]["endpoints_total"], 1);
        assert_eq!(json["tasks"]["tasks_total"], 0);
    }

    #[tokio::test]
    async fn metrics_renders_text_exposition() {
        let app = build_router(test_state(), 8);

        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }

    #[tokio::test]
    async fn task_route_without_upgrade_is_rejected() {
        // A plain GET (no upgrade headers) must not be treated as a
        // control client.
        let app = build_router(test_state(), 8);

        let response = app
            .oneshot(Request::get("/task").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_ne!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_payload_answers_invalid_message() {
        let supervisor = Supervisor::new();

        let reply = process_batch(&supervisor, "not json at all").await;

        let responses: Vec<CommandResponse> = serde_json::from_str(&reply).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::InvalidMessage);
    }

    #[tokio::test]
    async fn batch_with_no_matching_tasks_answers_empty() {
        let supervisor = Supervisor::new();

        let reply = process_batch(&supervisor, r#"[{"message_code": 7}]"#).await;

        let responses: Vec<CommandResponse> = serde_json::from_str(&reply).unwrap();
        assert!(responses.is_empty());
    }

    #[tokio::test]
    async fn bare_object_is_accepted_as_batch_of_one() {
        let supervisor = Supervisor::new();

        let reply = process_batch(
            &supervisor,
            r#"{"message_code": 0, "task_id": "t1"}"#,
        )
        .await;

        let responses: Vec<CommandResponse> = serde_json::from_str(&reply).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].kind, ResponseKind::TaskNotFound);
    }

    #[tokio::test]
    async fn unknown_message_code_is_invalid() {
        let supervisor = Supervisor::new();

        let reply = process_batch(&supervisor, r#"[{"message_code": 42}]"#).await;

        let responses: Vec<CommandResponse> = serde_json::from_str(&reply).unwrap();
        assert_eq!(responses[0].kind, ResponseKind::InvalidMessage);
    }
}
