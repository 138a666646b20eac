//! Integration tests for the Pomelo offline support layer.
//!
//! # Test Categories
//!
//! - `offline_order_flow` - store + connectivity relay working together
//! - `gateway_offline_browsing` - the gateway served over a real socket,
//!   browsing with the upstream up and then down
//!
//! The helpers here spin up a counting stub upstream and a gateway bound to
//! an ephemeral port, so tests talk to the gateway the way a page would:
//! over HTTP with `reqwest`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use tokio::task::JoinHandle;

/// A stub storefront origin that counts the requests it serves.
pub struct StubUpstream {
    /// Base URL of the stub, e.g. `http://127.0.0.1:49152`.
    pub origin: String,
    hits: Arc<AtomicUsize>,
    server: JoinHandle<()>,
}

impl StubUpstream {
    /// Bind the stub to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics when the listener cannot bind; tests have no fallback.
    #[allow(clippy::unwrap_used)]
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        // Every response closes its connection so that stopping the server
        // really takes the upstream away: no pooled keep-alive connection
        // can outlive the accept loop.
        let app = Router::new().fallback(move |request: Request| {
            let hits = Arc::clone(&counter);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                let close = [(header::CONNECTION, "close")];
                match request.uri().path() {
                    "/" => (close, Html("<html>home</html>")).into_response(),
                    "/assets/app.css" => (
                        [
                            (header::CONNECTION, "close"),
                            (header::CONTENT_TYPE, "text/css"),
                        ],
                        "body{margin:0}",
                    )
                        .into_response(),
                    "/img/banner1.png" => (
                        [
                            (header::CONNECTION, "close"),
                            (header::CONTENT_TYPE, "image/png"),
                        ],
                        "png-bytes",
                    )
                        .into_response(),
                    "/missing.css" => (StatusCode::NOT_FOUND, close, "").into_response(),
                    _ => (close, Html("<html>page</html>")).into_response(),
                }
            }
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            origin: format!("http://{addr}"),
            hits,
            server,
        }
    }

    /// Number of requests the stub has served so far.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Take the upstream down; subsequent connections are refused.
    pub async fn stop(&self) {
        self.server.abort();
        while !self.server.is_finished() {
            tokio::task::yield_now().await;
        }
    }
}
