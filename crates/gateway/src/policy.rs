//! Cache-selection policy: the one place a per-request decision is made.
//!
//! Every intercepted request is classified into one of three buckets:
//!
//! - **Bypass** - the target host manages its own caching and auth
//!   semantics (identity, analytics, storage, media hosting) and must never
//!   be served stale or offline; the gateway forwards it untouched.
//! - **Cache-first** - static assets (stylesheets, scripts, images, fonts,
//!   allowed external library origins); a cached copy is trusted until its
//!   generation rotates.
//! - **Network-first** - everything else, typically HTML documents.

use axum::http::HeaderMap;
use axum::http::header;
use url::Url;

/// Hosts that are never intercepted, matched by substring containment
/// against the absolute request URL.
const EXCLUDED_HOSTS: &[&str] = &[
    // Identity / auth
    "accounts.google.com",
    "identitytoolkit.googleapis.com",
    "securetoken.googleapis.com",
    "oauth2.googleapis.com",
    // Analytics
    "google-analytics.com",
    "googletagmanager.com",
    // Data and storage services
    "firestore.googleapis.com",
    "firebaseio.com",
    "firebasestorage.googleapis.com",
    "www.googleapis.com",
    // Media hosting
    "cloudinary.com",
    "res.cloudinary.com",
    "gstatic.com",
];

/// Path extensions classified as static assets.
const STATIC_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "woff",
    "woff2", "ttf",
];

/// Subset of [`STATIC_EXTENSIONS`] that identifies image requests.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico"];

/// Which fetch/cache strategy applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Forward directly to the network; no caching, no fallback.
    Bypass,
    /// Serve from cache when present; consult the network only on a miss.
    CacheFirst,
    /// Attempt the network; fall back to cache only on failure.
    NetworkFirst,
}

/// The per-request classification policy.
#[derive(Debug, Clone)]
pub struct InterceptPolicy {
    /// Query-stripped URL prefixes of allowed external static origins,
    /// precomputed from the external-library manifest.
    static_origins: Vec<String>,
}

impl InterceptPolicy {
    /// Build the policy, precomputing the allowed external static origin
    /// set from the external-library URL list.
    #[must_use]
    pub fn new(external_static: &[String]) -> Self {
        let static_origins = external_static
            .iter()
            .map(|u| strip_query(u).to_string())
            .collect();
        Self { static_origins }
    }

    /// Classify an absolute request target.
    #[must_use]
    pub fn classify(&self, target: &Url) -> RequestClass {
        let url = target.as_str();

        if EXCLUDED_HOSTS.iter().any(|host| url.contains(host)) {
            return RequestClass::Bypass;
        }

        if self.is_static(target) {
            RequestClass::CacheFirst
        } else {
            RequestClass::NetworkFirst
        }
    }

    fn is_static(&self, target: &Url) -> bool {
        if path_extension(target)
            .is_some_and(|ext| STATIC_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
        {
            return true;
        }

        let url = strip_query(target.as_str());
        self.static_origins.iter().any(|origin| url.starts_with(origin.as_str()))
    }
}

/// Whether the request expects an image response: an `Accept` header that
/// prefers images, or an image path extension.
#[must_use]
pub fn expects_image(headers: &HeaderMap, target: &Url) -> bool {
    if accept_header(headers).is_some_and(|accept| accept.starts_with("image/")) {
        return true;
    }
    path_extension(target)
        .is_some_and(|ext| IMAGE_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

/// Whether the request expects an HTML document.
#[must_use]
pub fn expects_document(headers: &HeaderMap) -> bool {
    accept_header(headers).is_some_and(|accept| accept.contains("text/html"))
}

fn accept_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ACCEPT).and_then(|v| v.to_str().ok())
}

fn path_extension(target: &Url) -> Option<&str> {
    let path = target.path();
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() { None } else { Some(ext) }
}

fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn policy() -> InterceptPolicy {
        InterceptPolicy::new(&[
            "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css".to_string(),
        ])
    }

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn test_excluded_hosts_bypass() {
        let policy = policy();
        assert_eq!(
            policy.classify(&url("https://accounts.google.com/o/oauth2/auth")),
            RequestClass::Bypass
        );
        assert_eq!(
            policy.classify(&url("https://res.cloudinary.com/demo/image/upload/p.jpg")),
            RequestClass::Bypass
        );
    }

    #[test]
    fn test_exclusion_wins_over_static_extension() {
        // An image hosted by an excluded provider is still bypassed.
        let policy = policy();
        assert_eq!(
            policy.classify(&url("https://firebasestorage.googleapis.com/b/img.png")),
            RequestClass::Bypass
        );
    }

    #[test]
    fn test_static_extensions_are_cache_first() {
        let policy = policy();
        for target in [
            "https://shop.test/assets/app.css",
            "https://shop.test/assets/app.js",
            "https://shop.test/img/banner1.png",
            "https://shop.test/icons/icon-192.svg",
            "https://shop.test/fonts/inter.woff2",
        ] {
            assert_eq!(policy.classify(&url(target)), RequestClass::CacheFirst, "{target}");
        }
    }

    #[test]
    fn test_extension_match_ignores_query() {
        let policy = policy();
        assert_eq!(
            policy.classify(&url("https://shop.test/assets/app.css?v=3")),
            RequestClass::CacheFirst
        );
    }

    #[test]
    fn test_external_library_origin_is_cache_first() {
        let policy = policy();
        assert_eq!(
            policy.classify(&url(
                "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css?x=1"
            )),
            RequestClass::CacheFirst
        );
    }

    #[test]
    fn test_documents_are_network_first() {
        let policy = policy();
        assert_eq!(
            policy.classify(&url("https://shop.test/")),
            RequestClass::NetworkFirst
        );
        assert_eq!(
            policy.classify(&url("https://shop.test/product.html")),
            RequestClass::NetworkFirst
        );
        assert_eq!(
            policy.classify(&url("https://shop.test/api/cart")),
            RequestClass::NetworkFirst
        );
    }

    #[test]
    fn test_expects_image() {
        let mut headers = HeaderMap::new();
        assert!(expects_image(&headers, &url("https://shop.test/img/p.webp")));
        assert!(!expects_image(&headers, &url("https://shop.test/page")));

        headers.insert("accept", HeaderValue::from_static("image/avif,image/webp,*/*"));
        assert!(expects_image(&headers, &url("https://shop.test/dynamic-image")));
    }

    #[test]
    fn test_expects_document() {
        let mut headers = HeaderMap::new();
        assert!(!expects_document(&headers));

        headers.insert(
            "accept",
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        assert!(expects_document(&headers));
    }
}
