//! Client identity from proxy headers.
//!
//! Behind a CDN or load balancer the socket peer is the proxy, so the client
//! address has to come from headers the proxy sets. Headers are consulted in
//! priority order and the first usable value wins:
//!
//! ```text
//!     x-forwarded-for: 203.0.113.7, 10.0.0.2   ──► "203.0.113.7"
//!     x-real-ip:       198.51.100.1            ──► (not consulted)
//!     cf-connecting-ip
//!     (none of them)                           ──► "unknown"
//! ```
//!
//! These headers are client-controlled unless a trusted proxy overwrites them;
//! deploy behind one that does.

use http::header::{HeaderMap, HeaderName};

/// Identifier used when no proxy header names the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// `x-forwarded-for`, possibly a comma-separated proxy chain.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// `x-real-ip`, set by nginx-style proxies.
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// `cf-connecting-ip`, set by Cloudflare.
pub const CF_CONNECTING_IP: HeaderName = HeaderName::from_static("cf-connecting-ip");

/// Default header priority used by [`get_real_ip`].
pub const CLIENT_IP_HEADERS: [HeaderName; 3] = [X_FORWARDED_FOR, X_REAL_IP, CF_CONNECTING_IP];

/// Best-effort client address from the default proxy headers.
///
/// Takes the first entry of a comma-separated list, trimmed. Returns
/// `"unknown"` when no header yields a value. Never fails.
///
/// ```rust
/// use http::HeaderMap;
/// use window_gate::get_real_ip;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());
/// headers.insert("x-forwarded-for", " 203.0.113.7 , 10.0.0.2".parse().unwrap());
///
/// assert_eq!(get_real_ip(&headers), "203.0.113.7");
/// assert_eq!(get_real_ip(&HeaderMap::new()), "unknown");
/// ```
pub fn get_real_ip(headers: &HeaderMap) -> String {
    get_real_ip_from(headers, &CLIENT_IP_HEADERS)
}

/// Like [`get_real_ip`] with a caller-chosen header priority.
///
/// A header whose value is not visible ASCII, or whose first entry is blank,
/// is skipped in favour of the next one.
pub fn get_real_ip_from(headers: &HeaderMap, priority: &[HeaderName]) -> String {
    priority
        .iter()
        .find_map(|name| first_entry(headers, name))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn first_entry<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    let value = headers.get(name)?.to_str().ok()?;
    let first = value.split(',').next()?.trim();
    (!first.is_empty()).then_some(first)
}
