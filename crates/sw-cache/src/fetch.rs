use crate::entry::CachedResponse;
use crate::error::FetchError;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use url::Url;

/// What kind of resource the client is asking for. Drives fallback choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Document,
    Image,
    Style,
    Script,
    Font,
    Other,
}

impl Destination {
    /// Best guess when the client does not say: by `Accept` header first,
    /// then by file extension.
    pub fn infer(url: &Url, accept: Option<&str>) -> Self {
        if let Some(accept) = accept {
            if accept.contains("text/html") {
                return Destination::Document;
            }
            if accept.starts_with("image/") {
                return Destination::Image;
            }
        }

        let path = url.path().to_ascii_lowercase();
        let ext = path.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
        match ext {
            "html" | "htm" => Destination::Document,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" | "avif" | "ico" => {
                Destination::Image
            }
            "css" => Destination::Style,
            "js" | "mjs" => Destination::Script,
            "woff" | "woff2" | "ttf" | "eot" | "otf" => Destination::Font,
            _ if path.ends_with('/') => Destination::Document,
            _ => Destination::Other,
        }
    }
}

/// An intercepted outgoing request.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl RequestInfo {
    /// A bodiless GET, destination inferred from the URL.
    pub fn get(url: Url) -> Self {
        let destination = Destination::infer(&url, None);
        Self {
            method: Method::GET,
            url,
            destination,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }
}

/// The network.
///
/// A response with a non-2xx status is still `Ok`: it is delivered to the
/// client but never cached. `Err` means no response arrived at all.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, req: &RequestInfo) -> Result<CachedResponse, FetchError>;
}
