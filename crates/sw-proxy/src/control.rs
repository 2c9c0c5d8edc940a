use crate::proxy::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use sw_cache::control::{ControlCommand, ControlReply};
use sw_cache::lifecycle::LifecycleState;
use sw_cache::metrics::MetricsSnapshot;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Combined state for the control router (holds both AppState and broadcast sender).
#[derive(Clone)]
pub struct ControlState {
    pub app: Arc<AppState>,
    pub tx: broadcast::Sender<MetricsSnapshot>,
}

pub fn router(state: ControlState) -> Router {
    Router::new()
        .route("/api/message", post(message_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/ws/metrics", get(ws_metrics_handler))
        .with_state(state)
}

/// Background task that snapshots metrics every 500ms and broadcasts to clients.
pub async fn metrics_broadcaster(
    state: Arc<AppState>,
    tx: broadcast::Sender<MetricsSnapshot>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(500));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                // Ignore send errors (no subscribers)
                let _ = tx.send(state.worker.metrics_snapshot());
            }
        }
    }
}

/// POST /api/message: the page → worker message channel.
pub async fn message_handler(
    State(state): State<ControlState>,
    Json(cmd): Json<ControlCommand>,
) -> Json<ControlReply> {
    Json(state.app.worker.handle_message(cmd))
}

#[derive(Serialize)]
struct StatusResponse {
    state: LifecycleState,
    clients_claimed: bool,
    hit_rate: f64,
    metrics: MetricsSnapshot,
}

/// GET /api/metrics: one-shot snapshot plus lifecycle state.
pub async fn metrics_handler(State(state): State<ControlState>) -> impl IntoResponse {
    let worker = &state.app.worker;
    let metrics = worker.metrics_snapshot();
    Json(StatusResponse {
        state: worker.state(),
        clients_claimed: worker.clients_claimed(),
        hit_rate: metrics.hit_rate(),
        metrics,
    })
}

/// WebSocket upgrade handler for /ws/metrics.
pub async fn ws_metrics_handler(
    ws: WebSocketUpgrade,
    State(state): State<ControlState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_client(socket, state.tx))
}

async fn handle_ws_client(mut socket: WebSocket, tx: broadcast::Sender<MetricsSnapshot>) {
    let mut rx = tx.subscribe();

    loop {
        match rx.recv().await {
            Ok(snapshot) => {
                let reply = ControlReply::PerformanceMetrics { metrics: snapshot };
                let json = match serde_json::to_string(&reply) {
                    Ok(j) => j,
                    Err(_) => continue,
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break; // Client disconnected
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_state, FakeNetwork};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(network: Arc<FakeNetwork>) -> (Router, Arc<AppState>) {
        let state = test_state(network);
        let (tx, _) = broadcast::channel(4);
        let router = router(ControlState {
            app: Arc::clone(&state),
            tx,
        });
        (router, state)
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, serde_json::Value) {
        let resp = app
            .oneshot(
                Request::post("/api/message")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn get_performance_metrics_replies_with_snapshot() {
        let (app, _) = app(FakeNetwork::new());
        let (status, json) = post_json(app, r#"{"type":"GET_PERFORMANCE_METRICS"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "PERFORMANCE_METRICS");
        assert_eq!(json["metrics"]["cacheHits"], 0);
    }

    #[tokio::test]
    async fn clear_cache_empties_storage() {
        let network = FakeNetwork::new();
        network.route("http://localhost:8080/assets/js/main.js", "console.log(1)");
        let (app, state) = app(network);

        let req = sw_cache::fetch::RequestInfo::get(
            url::Url::parse("http://localhost:8080/assets/js/main.js").unwrap(),
        );
        state.worker.handle_fetch(req).await;
        assert!(!state.worker.storage().keys().is_empty());

        let (status, json) = post_json(app, r#"{"type":"CLEAR_CACHE"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["type"], "ACK");
        assert!(state.worker.storage().keys().is_empty());
        assert_eq!(state.worker.metrics_snapshot().network_requests, 0);
    }

    #[tokio::test]
    async fn unknown_message_is_rejected() {
        let (app, _) = app(FakeNetwork::new());
        let (status, _) = post_json(app, r#"{"type":"SELF_DESTRUCT"}"#).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_state() {
        let (app, _) = app(FakeNetwork::new());
        let resp = app
            .oneshot(Request::get("/api/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["state"], "parsed");
        assert_eq!(json["clients_claimed"], false);
    }
}
