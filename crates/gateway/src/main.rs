//! Pomelo offline gateway - fronts the storefront origin.
//!
//! # Architecture
//!
//! - Axum service with a catch-all interception fallback
//! - Cache-first for static assets, network-first for documents
//! - Excluded hosts (identity, analytics, storage, media) bypass entirely
//! - Versioned cache generations in embedded `SQLite`; stale generations
//!   purged wholesale on activation
//!
//! The warm-up (install) runs in the background: serving starts
//! immediately rather than waiting for the manifest precache.

#![cfg_attr(not(test), forbid(unsafe_code))]

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pomelo_gateway::{
    AppState, AssetCache, AssetManifest, GatewayConfig, InterceptPolicy, Interceptor,
    UpstreamClient, app, lifecycle,
};

#[tokio::main]
async fn main() {
    // Load configuration from environment
    let config = GatewayConfig::from_env().expect("Failed to load configuration");

    // Initialize tracing with EnvFilter
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pomelo_gateway=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Open cache storage
    let cache = AssetCache::open(&config.cache_db)
        .await
        .expect("Failed to open cache storage");
    tracing::info!(path = %config.cache_db.display(), "cache storage opened");

    let upstream = UpstreamClient::new(config.upstream_origin.clone());
    let manifest = AssetManifest::storefront_default();
    let policy = InterceptPolicy::new(&manifest.external);
    let generation = config.generation();

    let interceptor = Interceptor::new(
        cache.clone(),
        upstream.clone(),
        policy,
        generation.clone(),
    );

    // Warm the cache and purge stale generations in the background;
    // serving starts immediately
    {
        let cache = cache.clone();
        let upstream = upstream.clone();
        let generation = generation.clone();
        tokio::spawn(async move {
            lifecycle::install(&cache, &upstream, &manifest, &generation).await;
            if let Err(err) = lifecycle::activate(&cache, &generation).await {
                tracing::error!(error = %err, "activation failed");
            }
        });
    }

    let state = AppState {
        interceptor,
        cache,
        generation,
    };
    let app = app(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
