//! Browsing through the gateway over a real socket, with the upstream up
//! and then down.

#![allow(clippy::unwrap_used)]

use pomelo_gateway::{
    AppState, AssetCache, CacheWriteOutcome, InterceptPolicy, Interceptor, UpstreamClient, app,
};
use pomelo_integration_tests::StubUpstream;
use tokio::sync::mpsc;

const GENERATION: &str = "pomelo-assets-itest";

struct Gateway {
    base_url: String,
    cache: AssetCache,
    writes: mpsc::UnboundedReceiver<CacheWriteOutcome>,
}

async fn start_gateway(upstream: &StubUpstream) -> Gateway {
    let cache = AssetCache::in_memory().await.unwrap();
    let client = UpstreamClient::new(upstream.origin.parse().unwrap());
    let (hook, writes) = mpsc::unbounded_channel();

    let interceptor = Interceptor::new(
        cache.clone(),
        client,
        InterceptPolicy::new(&[]),
        GENERATION.to_string(),
    )
    .with_write_hook(hook);

    let state = AppState {
        interceptor,
        cache: cache.clone(),
        generation: GENERATION.to_string(),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    Gateway {
        base_url: format!("http://{addr}"),
        cache,
        writes,
    }
}

#[tokio::test]
async fn test_browsing_stays_available_when_upstream_goes_down() {
    let upstream = StubUpstream::start().await;
    let mut gateway = start_gateway(&upstream).await;
    let client = reqwest::Client::new();

    // Online browsing: the shell and a stylesheet pass through and are
    // captured in the background.
    let response = client
        .get(format!("{}/", gateway.base_url))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "<html>home</html>");

    let response = client
        .get(format!("{}/assets/app.css", gateway.base_url))
        .header("accept", "text/css,*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    gateway.writes.recv().await.unwrap();
    gateway.writes.recv().await.unwrap();
    let hits_while_online = upstream.hit_count();
    assert_eq!(hits_while_online, 2);

    upstream.stop().await;

    // The cached stylesheet is served cache-first without the network.
    let response = client
        .get(format!("{}/assets/app.css", gateway.base_url))
        .header("accept", "text/css,*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "body{margin:0}");
    assert_eq!(upstream.hit_count(), hits_while_online);

    // The home document falls back to its cached copy.
    let response = client
        .get(format!("{}/", gateway.base_url))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "<html>home</html>");

    // An unvisited document falls back to the cached root.
    let response = client
        .get(format!("{}/deals.html", gateway.base_url))
        .header("accept", "text/html")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "<html>home</html>");

    // An uncached image degrades to the placeholder graphic.
    let response = client
        .get(format!("{}/img/banner1.png", gateway.base_url))
        .header("accept", "image/avif,image/webp,*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/svg+xml"
    );
}

#[tokio::test]
async fn test_health_and_control_routes() {
    let upstream = StubUpstream::start().await;
    let gateway = start_gateway(&upstream).await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/_gateway/health", gateway.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/_gateway/health/ready", gateway.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Seed a stale generation, then force activation through the control
    // message a page would send.
    gateway
        .cache
        .put(
            "pomelo-assets-v0.6.0",
            "stale",
            &pomelo_gateway::CachedResponse {
                status: 200,
                headers: Vec::new(),
                body: b"old".to_vec(),
            },
        )
        .await
        .unwrap();

    let response = client
        .post(format!("{}/_gateway/control", gateway.base_url))
        .json(&serde_json::json!({"kind": "activate"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let generations = gateway.cache.generations().await.unwrap();
    assert!(!generations.contains(&"pomelo-assets-v0.6.0".to_string()));
}

#[tokio::test]
async fn test_excluded_host_is_forwarded_untouched_and_never_cached() {
    let upstream = StubUpstream::start().await;
    let mut gateway = start_gateway(&upstream).await;
    let client = reqwest::Client::new();

    // The exclusion list matches by substring containment against the
    // whole URL, so a target mentioning an excluded host bypasses
    // interception even though the upstream is reachable.
    let response = client
        .get(format!(
            "{}/relay/google-analytics.com/collect",
            gateway.base_url
        ))
        .header("accept", "*/*")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(upstream.hit_count(), 1);

    // Forwarded untouched: no cache write happened, ever.
    tokio::task::yield_now().await;
    assert!(gateway.writes.try_recv().is_err());
    assert!(gateway.cache.generations().await.unwrap().is_empty());
}
