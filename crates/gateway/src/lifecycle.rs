//! Install and activation lifecycle.
//!
//! Install warms the current cache generation from the asset manifests;
//! activation garbage-collects every generation left behind by prior
//! versions. Both run in the background at startup, and activation can be
//! re-triggered through the control route.

use axum::http::{HeaderMap, Method};

use crate::cache::{AssetCache, CacheError};
use crate::error::GatewayError;
use crate::manifest::AssetManifest;
use crate::proxy::UpstreamClient;

/// Warm `generation` from the manifest lists.
///
/// The critical list is cached as a bulk step first; if that fails, each
/// critical asset is retried individually with misses logged, never fatal.
/// Secondary and external assets are best-effort throughout. Serving does
/// not wait for this.
pub async fn install(
    cache: &AssetCache,
    upstream: &UpstreamClient,
    manifest: &AssetManifest,
    generation: &str,
) {
    tracing::info!(
        generation,
        critical = manifest.critical.len(),
        "precaching critical assets"
    );

    if let Err(err) = precache_all(cache, upstream, &manifest.critical, generation).await {
        tracing::error!(error = %err, "bulk precache failed, retrying critical assets individually");
        for path in &manifest.critical {
            match precache_one(cache, upstream, path, generation).await {
                Ok(()) => tracing::info!(url = %path, "critical asset cached"),
                Err(err) => {
                    tracing::warn!(url = %path, error = %err, "critical asset could not be cached");
                }
            }
        }
    }

    tracing::info!(count = manifest.secondary.len(), "precaching secondary assets");
    for path in &manifest.secondary {
        if let Err(err) = precache_one(cache, upstream, path, generation).await {
            tracing::warn!(url = %path, error = %err, "secondary asset unavailable, skipped");
        }
    }

    tracing::info!(count = manifest.external.len(), "precaching external library assets");
    for url in &manifest.external {
        if let Err(err) = precache_one(cache, upstream, url, generation).await {
            tracing::warn!(url = %url, error = %err, "external library asset unavailable, skipped");
        }
    }

    tracing::info!(generation, "install complete");
}

/// Cache every URL in `paths`, failing on the first miss.
async fn precache_all(
    cache: &AssetCache,
    upstream: &UpstreamClient,
    paths: &[String],
    generation: &str,
) -> Result<(), GatewayError> {
    for path in paths {
        precache_one(cache, upstream, path, generation).await?;
    }
    Ok(())
}

/// Fetch one asset and store it in `generation`.
async fn precache_one(
    cache: &AssetCache,
    upstream: &UpstreamClient,
    path: &str,
    generation: &str,
) -> Result<(), GatewayError> {
    let url = upstream.resolve_path(path)?;
    let fetched = upstream
        .fetch(&Method::GET, &url, &HeaderMap::new(), Vec::new())
        .await?;
    if !fetched.ok() {
        return Err(GatewayError::BadStatus(fetched.status));
    }
    cache.put(generation, url.as_str(), &fetched).await?;
    Ok(())
}

/// Delete every generation whose name differs from `active`.
///
/// Returns the names of the removed generations.
///
/// # Errors
///
/// Returns [`CacheError`] on storage failure.
pub async fn activate(cache: &AssetCache, active: &str) -> Result<Vec<String>, CacheError> {
    let removed = cache.purge_stale(active).await?;
    for name in &removed {
        tracing::info!(generation = %name, "stale cache generation removed");
    }
    tracing::info!(active, removed = removed.len(), "cache generation activated");
    Ok(removed)
}
