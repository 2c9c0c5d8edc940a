use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use sw_cache::fetch::{Fetcher, RequestInfo};
use sw_cache::{CachedResponse, FetchError};
use url::Url;

pub type HttpClient = Client<hyper_util::client::legacy::connect::HttpConnector, Body>;

/// Headers that describe one hop and must not be forwarded or cached.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "host",
    "content-length",
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// The network as seen by the worker: same-origin requests are forwarded to
/// the upstream origin, cross-origin `http` requests go out directly.
pub struct HyperFetcher {
    client: HttpClient,
    origin: Url,
    upstream: Url,
    timeout: Duration,
}

impl HyperFetcher {
    pub fn new(origin: Url, upstream: Url, timeout: Duration) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            origin,
            upstream,
            timeout,
        }
    }

    /// Where a request actually goes.
    fn target(&self, url: &Url) -> Result<Url, FetchError> {
        if url.origin() != self.origin.origin() {
            if url.scheme() != "http" {
                return Err(FetchError::InvalidRequest(format!(
                    "unsupported scheme for {url}"
                )));
            }
            return Ok(url.clone());
        }

        let mut target = self.upstream.clone();
        target.set_path(url.path());
        target.set_query(url.query());
        Ok(target)
    }

    async fn send(&self, req: &RequestInfo) -> Result<CachedResponse, FetchError> {
        let target = self.target(&req.url)?;

        let mut builder = Request::builder().method(req.method.clone()).uri(target.as_str());
        for (name, value) in &req.headers {
            if !is_hop_by_hop(name) {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        let upstream_req = builder
            .body(Body::from(req.body.clone()))
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let upstream_resp = self
            .client
            .request(upstream_req)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = upstream_resp.status().as_u16();
        let headers: Vec<(String, String)> = upstream_resp
            .headers()
            .iter()
            .filter(|(k, _)| !is_hop_by_hop(k.as_str()))
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();

        let body = upstream_resp
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .to_bytes();

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HyperFetcher {
    async fn fetch(&self, req: &RequestInfo) -> Result<CachedResponse, FetchError> {
        let started = std::time::Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.send(req)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.timeout.as_millis() as u64)),
        };

        match &result {
            Ok(resp) => tracing::debug!(
                url = %req.url,
                status = resp.status,
                latency_us = started.elapsed().as_micros(),
                "upstream response"
            ),
            Err(e) => tracing::warn!(url = %req.url, error = %e, "upstream request failed"),
        }
        result
    }
}
