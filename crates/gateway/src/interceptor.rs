//! The per-request interception state machine.
//!
//! Exclusion check, then classification, then the matching fetch/cache
//! strategy with fallback synthesis on failure. The request path is
//! infallible toward the client: every internal failure resolves to a
//! synthesized response, never a surfaced error.

use axum::body::Body;
use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method};
use axum::response::Response;
use tokio::sync::mpsc;
use url::Url;

use crate::cache::{AssetCache, CacheError, CachedResponse};
use crate::fallback;
use crate::policy::{self, InterceptPolicy, RequestClass};
use crate::proxy::UpstreamClient;

/// Completion report of a fire-and-forget cache write, delivered through
/// the optional write hook so tests can await background writes instead of
/// racing them.
#[derive(Debug)]
pub struct CacheWriteOutcome {
    /// URL the write was keyed under.
    pub url: String,
    /// Result of the write; failures are also logged.
    pub result: Result<(), CacheError>,
}

/// The request filter: classifies every request and applies the matching
/// fetch/cache policy.
#[derive(Clone)]
pub struct Interceptor {
    cache: AssetCache,
    upstream: UpstreamClient,
    policy: InterceptPolicy,
    generation: String,
    write_hook: Option<mpsc::UnboundedSender<CacheWriteOutcome>>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    /// Build an interceptor serving `generation` from `cache`.
    #[must_use]
    pub fn new(
        cache: AssetCache,
        upstream: UpstreamClient,
        policy: InterceptPolicy,
        generation: String,
    ) -> Self {
        Self {
            cache,
            upstream,
            policy,
            generation,
            write_hook: None,
        }
    }

    /// Report every background cache-write completion to `hook`.
    #[must_use]
    pub fn with_write_hook(mut self, hook: mpsc::UnboundedSender<CacheWriteOutcome>) -> Self {
        self.write_hook = Some(hook);
        self
    }

    /// Name of the cache generation this interceptor serves.
    #[must_use]
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Handle one intercepted request.
    pub async fn handle(&self, request: Request) -> Response {
        let (parts, body) = request.into_parts();

        let target = match self.upstream.resolve(&parts.uri) {
            Ok(target) => target,
            Err(err) => {
                tracing::warn!(uri = %parts.uri, error = %err, "unresolvable request target");
                return fallback::unavailable();
            }
        };

        let body = match axum::body::to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes.to_vec(),
            Err(err) => {
                tracing::warn!(url = %target, error = %err, "failed to buffer request body");
                Vec::new()
            }
        };

        match self.policy.classify(&target) {
            RequestClass::Bypass => self.forward_untouched(&parts, &target, body).await,
            RequestClass::CacheFirst => self.cache_first(&parts, &target).await,
            RequestClass::NetworkFirst => self.network_first(&parts, &target, body).await,
        }
    }

    /// Excluded host: straight to the network, no cache read or write, no
    /// fallback synthesis.
    async fn forward_untouched(&self, parts: &Parts, target: &Url, body: Vec<u8>) -> Response {
        tracing::debug!(url = %target, "excluded host, forwarding untouched");
        match self
            .upstream
            .fetch(&parts.method, target, &parts.headers, body)
            .await
        {
            Ok(fetched) => fetched.into_response(),
            Err(err) => {
                tracing::warn!(url = %target, error = %err, "excluded host unreachable");
                fallback::bad_gateway()
            }
        }
    }

    /// Static asset: cache hit wins, network fills misses, placeholder on
    /// total failure.
    async fn cache_first(&self, parts: &Parts, target: &Url) -> Response {
        if let Some(cached) = self.lookup(target.as_str()).await {
            tracing::debug!(url = %target, "static asset served from cache");
            return cached.into_response();
        }

        match self
            .upstream
            .fetch(&parts.method, target, &parts.headers, Vec::new())
            .await
        {
            Ok(fetched) => {
                self.store_in_background(&parts.method, target, &fetched);
                fetched.into_response()
            }
            Err(err) => {
                tracing::warn!(url = %target, error = %err, "static asset unreachable and uncached");
                if policy::expects_image(&parts.headers, target) {
                    fallback::placeholder_image()
                } else {
                    fallback::unavailable()
                }
            }
        }
    }

    /// Document or other dynamic request: network wins, cache fills
    /// failures, offline page as the last resort for documents.
    async fn network_first(&self, parts: &Parts, target: &Url, body: Vec<u8>) -> Response {
        match self
            .upstream
            .fetch(&parts.method, target, &parts.headers, body)
            .await
        {
            Ok(fetched) => {
                self.store_in_background(&parts.method, target, &fetched);
                fetched.into_response()
            }
            Err(err) => {
                tracing::info!(url = %target, error = %err, "network failed, trying cache");
                self.dynamic_fallback(&parts.headers, target).await
            }
        }
    }

    async fn dynamic_fallback(&self, headers: &HeaderMap, target: &Url) -> Response {
        if let Some(cached) = self.lookup(target.as_str()).await {
            tracing::info!(url = %target, "served from cache");
            return cached.into_response();
        }

        if policy::expects_document(headers) {
            let root = self.upstream.origin_root();
            if let Some(cached) = self.lookup(&root).await {
                tracing::info!(url = %target, "served cached root document");
                return cached.into_response();
            }
            return fallback::offline_page();
        }

        fallback::unavailable()
    }

    /// Cache read with storage failures logged and treated as misses.
    async fn lookup(&self, url: &str) -> Option<CachedResponse> {
        match self.cache.get(&self.generation, url).await {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!(url, error = %err, "cache lookup failed");
                None
            }
        }
    }

    /// Fire-and-forget capture of a served response.
    ///
    /// Only successful GET responses are stored. The response path does not
    /// wait for the write; an interrupted write is equivalent to a cache
    /// miss next time.
    fn store_in_background(&self, method: &Method, target: &Url, fetched: &CachedResponse) {
        if *method != Method::GET || !fetched.ok() {
            return;
        }

        let cache = self.cache.clone();
        let generation = self.generation.clone();
        let url = target.to_string();
        let entry = fetched.clone();
        let hook = self.write_hook.clone();

        tokio::spawn(async move {
            let result = cache.put(&generation, &url, &entry).await;
            match &result {
                Ok(()) => tracing::debug!(%url, "response cached"),
                Err(err) => tracing::warn!(%url, error = %err, "cache write failed"),
            }
            if let Some(hook) = hook {
                let _ = hook.send(CacheWriteOutcome { url, result });
            }
        });
    }
}
