//! Upstream fetch client.
//!
//! Resolves intercepted request targets to absolute URLs (the gateway
//! fronts one origin, but proxy-style absolute targets — CDN libraries,
//! excluded hosts — pass through unchanged) and captures upstream
//! responses in the shape the cache stores.
//!
//! No timeout is applied to any fetch; a hung upstream request blocks that
//! single interception indefinitely.

use axum::http::{HeaderMap, Method, Uri, header};
use url::Url;

use crate::cache::CachedResponse;

/// Client for the origin the gateway fronts.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    origin: Url,
}

impl UpstreamClient {
    /// Create a client fronting `origin`.
    #[must_use]
    pub fn new(origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
        }
    }

    /// The origin's root document URL, the last-resort fallback key for
    /// document requests.
    #[must_use]
    pub fn origin_root(&self) -> String {
        let mut root = self.origin.clone();
        root.set_path("/");
        root.set_query(None);
        root.to_string()
    }

    /// Resolve a request target to an absolute URL.
    ///
    /// Absolute-form targets (scheme and authority present) are taken
    /// verbatim; origin-form targets are joined onto the fronted origin.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the target cannot form a valid URL.
    pub fn resolve(&self, target: &Uri) -> Result<Url, url::ParseError> {
        if target.scheme().is_some() && target.authority().is_some() {
            return target.to_string().parse();
        }

        let path_and_query = target
            .path_and_query()
            .map_or("/", axum::http::uri::PathAndQuery::as_str);
        self.origin.join(path_and_query)
    }

    /// Resolve a manifest entry: absolute URLs pass through, origin-relative
    /// paths join the fronted origin.
    ///
    /// # Errors
    ///
    /// Returns [`url::ParseError`] when the entry cannot form a valid URL.
    pub fn resolve_path(&self, target: &str) -> Result<Url, url::ParseError> {
        match Url::parse(target) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self.origin.join(target),
            Err(err) => Err(err),
        }
    }

    /// Fetch `url` and capture the response.
    ///
    /// Hop-by-hop request headers and the host header are not forwarded;
    /// hop-by-hop response headers are stripped from the capture.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] when the network fetch fails.
    pub async fn fetch(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Vec<u8>,
    ) -> Result<CachedResponse, reqwest::Error> {
        let method = reqwest::Method::from_bytes(method.as_str().as_bytes())
            .unwrap_or(reqwest::Method::GET);

        let mut request = self.client.request(method, url.as_str());
        for (name, value) in headers {
            if skip_request_header(name.as_str()) {
                continue;
            }
            request = request.header(name.as_str(), value.as_bytes());
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(CachedResponse {
            status,
            headers,
            body,
        }
        .without_hop_by_hop())
    }
}

fn skip_request_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(header::HOST.as_str())
        || name.eq_ignore_ascii_case(header::CONTENT_LENGTH.as_str())
        || name.eq_ignore_ascii_case(header::CONNECTION.as_str())
}
