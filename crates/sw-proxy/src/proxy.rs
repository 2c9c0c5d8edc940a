use crate::upstream::is_hop_by_hop;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use axum::routing::any;
use axum::Router;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Instant;
use sw_cache::fetch::{Destination, RequestInfo};
use sw_cache::worker::Handled;
use sw_cache::ServiceWorker;
use tower_http::trace::TraceLayer;
use url::Url;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub worker: ServiceWorker,
    /// Origin the controlled pages are served from.
    pub origin: Url,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{*path}", any(proxy_handler))
        .route("/", any(proxy_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Intercept a request and let the worker answer it.
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    req: Request<Body>,
) -> Response<Body> {
    let start = Instant::now();

    let info = match request_info(&state.origin, req).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(error = %e, "rejected malformed request");
            return plain(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };
    let method = info.method.clone();
    let url = info.url.clone();

    let handled = state.worker.handle_fetch(info).await;

    let elapsed = start.elapsed();
    ::metrics::histogram!("sw_request_duration_seconds", "outcome" => handled.outcome.as_str())
        .record(elapsed.as_secs_f64());
    tracing::debug!(
        method = %method,
        url = %url,
        outcome = handled.outcome.as_str(),
        rule = handled.rule.as_deref().unwrap_or("-"),
        status = handled.response.status,
        latency_us = elapsed.as_micros(),
        "request handled"
    );

    build_response(handled)
}

/// Turn an incoming request into the worker's view of it. Absolute-form
/// URIs (forward-proxy style) keep their own origin; everything else is
/// resolved against the controlled origin.
async fn request_info(origin: &Url, req: Request<Body>) -> Result<RequestInfo, String> {
    let (parts, body) = req.into_parts();

    let url = if parts.uri.scheme().is_some() {
        Url::parse(&parts.uri.to_string()).map_err(|e| e.to_string())?
    } else {
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        origin.join(path).map_err(|e| e.to_string())?
    };

    let headers: Vec<(String, String)> = parts
        .headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
        .collect();

    let destination = parts
        .headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
        .and_then(destination_from_fetch_dest)
        .unwrap_or_else(|| {
            let accept = parts.headers.get("accept").and_then(|v| v.to_str().ok());
            Destination::infer(&url, accept)
        });

    let body = body.collect().await.map_err(|e| e.to_string())?.to_bytes();

    Ok(RequestInfo {
        method: parts.method,
        url,
        destination,
        headers,
        body,
    })
}

fn destination_from_fetch_dest(dest: &str) -> Option<Destination> {
    match dest {
        "document" | "iframe" => Some(Destination::Document),
        "image" => Some(Destination::Image),
        "style" => Some(Destination::Style),
        "script" => Some(Destination::Script),
        "font" => Some(Destination::Font),
        "empty" => Some(Destination::Other),
        _ => None,
    }
}

/// Build an HTTP response from what the worker returned.
fn build_response(handled: Handled) -> Response<Body> {
    let mut response = Response::new(Body::from(handled.response.body));
    *response.status_mut() =
        StatusCode::from_u16(handled.response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = response.headers_mut();
    for (key, value) in &handled.response.headers {
        if is_hop_by_hop(key) {
            continue;
        }
        if let (Ok(k), Ok(v)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.append(k, v);
        }
    }

    headers.insert("x-cache", HeaderValue::from_static(handled.outcome.as_str()));
    if let Some(rule) = handled.rule {
        if let Ok(v) = HeaderValue::from_str(&rule) {
            headers.insert("x-sw-rule", v);
        }
    }

    response
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
}
