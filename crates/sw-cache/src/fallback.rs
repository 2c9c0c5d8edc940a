//! Responses synthesized when every strategy has failed. Nothing here touches
//! the network or the store, so none of it can fail.

use crate::entry::CachedResponse;
use crate::fetch::{Destination, RequestInfo};

/// Path the offline page is cached under at install.
pub const OFFLINE_URL: &str = "/offline.html";

/// Marks a synthesized response.
pub const FALLBACK_HEADER: &str = "x-sw-fallback";

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>You're offline</title>
<style>
  body { margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center;
         font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
         background: linear-gradient(135deg, #0f172a, #1e293b); color: #e2e8f0; }
  main { max-width: 28rem; padding: 2rem; text-align: center; }
  h1 { font-size: 1.75rem; margin-bottom: 0.5rem; }
  p { line-height: 1.5; color: #94a3b8; }
  button { margin-top: 1.5rem; padding: 0.75rem 1.5rem; border: 0; border-radius: 999px;
           background: #38bdf8; color: #0f172a; font-weight: 600; cursor: pointer; }
</style>
</head>
<body>
<main>
  <h1>You're offline</h1>
  <p>This page isn't available without a connection. Pages you have already
  visited still work, and everything will sync again once you're back online.</p>
  <button type="button" onclick="window.location.reload()">Try again</button>
</main>
</body>
</html>
"#;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="300" viewBox="0 0 400 300"><rect width="400" height="300" fill="#e2e8f0"/><path d="M150 190l40-50 30 36 20-24 40 38z" fill="#94a3b8"/><circle cx="250" cy="110" r="16" fill="#94a3b8"/><text x="200" y="250" font-family="sans-serif" font-size="16" fill="#64748b" text-anchor="middle">Image unavailable offline</text></svg>"##;

/// The offline fallback document (what install caches under [`OFFLINE_URL`]).
pub fn offline_page() -> CachedResponse {
    CachedResponse::new(
        200,
        vec![
            ("content-type".into(), "text/html; charset=utf-8".into()),
            (FALLBACK_HEADER.into(), "offline".into()),
        ],
        OFFLINE_PAGE,
    )
}

/// Placeholder for images. Built on demand, never cached.
pub fn placeholder_image() -> CachedResponse {
    CachedResponse::new(
        200,
        vec![
            ("content-type".into(), "image/svg+xml".into()),
            ("cache-control".into(), "no-store".into()),
            (FALLBACK_HEADER.into(), "placeholder".into()),
        ],
        PLACEHOLDER_SVG,
    )
}

/// Generic failure for everything that is neither a page nor an image.
pub fn network_error() -> CachedResponse {
    CachedResponse::new(
        408,
        vec![
            ("content-type".into(), "text/plain; charset=utf-8".into()),
            (FALLBACK_HEADER.into(), "error".into()),
        ],
        "Network error: you appear to be offline",
    )
}

/// Pick the fallback for a request that nothing could serve. `cached_offline`
/// is the installed offline page, if the store still has it.
pub fn for_request(req: &RequestInfo, cached_offline: Option<&CachedResponse>) -> CachedResponse {
    match req.destination {
        Destination::Document => cached_offline.cloned().unwrap_or_else(offline_page),
        Destination::Image => placeholder_image(),
        _ => network_error(),
    }
}
