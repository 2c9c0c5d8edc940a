use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::time::Duration;

/// Header stamped on every response this crate writes to a cache.
pub const SW_CACHE_DATE: &str = "sw-cache-date";

/// An HTTP response as stored in (and served from) a cache.
///
/// The body is `Bytes`, so the copy handed back to the client and the copy
/// written to the cache share one allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// 2xx.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replace (or add) a header.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.into()));
    }

    /// Copy of this response carrying a fresh `sw-cache-date`.
    pub fn stamped(&self, now: DateTime<Utc>) -> Self {
        let mut copy = self.clone();
        copy.set_header(SW_CACHE_DATE, now.to_rfc3339_opts(SecondsFormat::Millis, true));
        copy
    }

    /// Capture time recorded in `sw-cache-date`, if the entry has a valid one.
    pub fn stored_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.header(SW_CACHE_DATE)?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Entries without a capture time count as expired (still usable as a
    /// last resort by the strategies).
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.stored_at() {
            Some(stored) => match (now - stored).to_std() {
                Ok(age) => age >= max_age,
                // stored in the future: clock went backwards, treat as fresh
                Err(_) => false,
            },
            None => true,
        }
    }

    /// Body length in bytes.
    pub fn size(&self) -> usize {
        self.body.len()
    }
}
