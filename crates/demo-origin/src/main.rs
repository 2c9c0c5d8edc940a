use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Origin {
    offline: AtomicBool,
    /// Upper bound for simulated latency; zero disables it.
    max_latency_ms: AtomicU64,
    /// How long an offline request hangs before answering 503. Must exceed
    /// the proxy's `upstream.timeout_ms` so the proxy gives up first.
    stall_ms: AtomicU64,
}

/// Offline requests hang this long by default.
const DEFAULT_STALL_MS: u64 = 30_000;

type Shared = Arc<Origin>;

const PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title>
<link rel="stylesheet" href="/assets/css/styles.css"></head>
<body><h1>{title}</h1>
<script src="/assets/js/main.js"></script></body>
</html>"#;

// 1x1 transparent PNG
const PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4,
    0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae,
    0x42, 0x60, 0x82,
];

fn page(title: &str) -> Response {
    (
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        PAGE.replace("{title}", title),
    )
        .into_response()
}

async fn index() -> Response {
    page("Drinkware")
}

async fn named_page(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "about.html" => page("About"),
        "products.html" => page("Products"),
        "contact.html" => page("Contact"),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stylesheet() -> Response {
    (
        [(header::CONTENT_TYPE, "text/css")],
        "body { font-family: sans-serif; margin: 2rem; }\n",
    )
        .into_response()
}

async fn script(Path(name): Path<String>) -> Response {
    match name.as_str() {
        "main.js" | "animations.js" => (
            [(header::CONTENT_TYPE, "application/javascript")],
            format!("console.log({name:?});\n"),
        )
            .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn manifest() -> Json<Value> {
    Json(json!({
        "name": "Drinkware",
        "start_url": "/",
        "display": "standalone",
        "icons": [
            { "src": "/assets/icons/icon-192.png", "sizes": "192x192", "type": "image/png" },
            { "src": "/assets/icons/icon-512.png", "sizes": "512x512", "type": "image/png" },
        ],
    }))
}

async fn image(Path(_name): Path<String>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], PIXEL_PNG).into_response()
}

async fn products() -> Json<Value> {
    let stock = rand::thread_rng().gen_range(0..=50);
    Json(json!([
        { "id": 1, "name": "Tumbler", "stock": stock },
        { "id": 2, "name": "Wine glass", "stock": 50 - stock },
    ]))
}

async fn product(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({ "id": id, "name": format!("Product {id}") }))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct OfflineToggle {
    offline: bool,
}

async fn set_offline(State(origin): State<Shared>, Json(toggle): Json<OfflineToggle>) -> Json<Value> {
    origin.offline.store(toggle.offline, Ordering::Relaxed);
    tracing::info!(offline = toggle.offline, "origin availability changed");
    Json(json!({ "offline": toggle.offline }))
}

/// Simulates latency and outages for every non-admin route.
///
/// While offline, a request stalls past the client's timeout before a 503
/// is sent, so the client sees a transport failure rather than a response.
async fn simulate(State(origin): State<Shared>, req: Request, next: Next) -> Response {
    if origin.offline.load(Ordering::Relaxed) {
        let stall = origin.stall_ms.load(Ordering::Relaxed);
        tracing::debug!(path = %req.uri().path(), stall_ms = stall, "offline, stalling request");
        tokio::time::sleep(Duration::from_millis(stall)).await;
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let max = origin.max_latency_ms.load(Ordering::Relaxed);
    if max > 0 {
        let delay = rand::thread_rng().gen_range(0..=max);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    next.run(req).await
}

fn router(origin: Shared) -> Router {
    let site = Router::new()
        .route("/", get(index))
        .route("/index.html", get(index))
        .route("/pages/{name}", get(named_page))
        .route("/assets/css/styles.css", get(stylesheet))
        .route("/assets/js/{name}", get(script))
        .route("/assets/icons/{name}", get(image))
        .route("/images/{name}", get(image))
        .route("/manifest.json", get(manifest))
        .route("/api/products", get(products))
        .route("/api/products/{id}", get(product))
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(origin.clone(), simulate));

    Router::new()
        .route("/admin/offline", post(set_offline))
        .merge(site)
        .with_state(origin)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let origin = Arc::new(Origin::default());
    origin.max_latency_ms.store(20, Ordering::Relaxed);
    origin.stall_ms.store(DEFAULT_STALL_MS, Ordering::Relaxed);

    let addr = "0.0.0.0:3000";
    tracing::info!(addr, "demo origin starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind demo origin to {addr}: {e}"));
    if let Err(e) = axum::serve(listener, router(origin)).await {
        tracing::error!(error = %e, "demo origin error");
    }
}
