//! Synthesized responses for exhausted fallback chains.
//!
//! These are the only user-visible failure shapes: a neutral placeholder
//! graphic for images, a minimal offline page for documents, and a generic
//! 503 for everything else. A raw error is never propagated to the page.

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Fixed-size neutral rectangle shown in place of unreachable images.
const PLACEHOLDER_IMAGE_SVG: &str = r##"<svg width="200" height="200" xmlns="http://www.w3.org/2000/svg"><rect fill="#e5e7eb" width="200" height="200"/><text fill="#9ca3af" font-size="16" x="50%" y="50%" text-anchor="middle" dominant-baseline="middle">No image</text></svg>"##;

/// Minimal inline page served when a document has no cached copy at all.
const OFFLINE_PAGE_HTML: &str = "<!doctype html>\
<html><head><meta charset=\"utf-8\"><title>Offline</title></head>\
<body><h1>Offline</h1><p>No connection is available and this page has not been cached yet.</p></body></html>";

/// Placeholder graphic for image requests that cannot be served.
///
/// Deliberately a successful response: broken-image icons in a product grid
/// are worse than a neutral rectangle.
#[must_use]
pub fn placeholder_image() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml")],
        PLACEHOLDER_IMAGE_SVG,
    )
        .into_response()
}

/// Minimal offline page for document requests with no cached copy.
#[must_use]
pub fn offline_page() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        OFFLINE_PAGE_HTML,
    )
        .into_response()
}

/// Generic failure response when no tailored fallback applies.
#[must_use]
pub fn unavailable() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Resource unavailable offline",
    )
        .into_response()
}

/// Plain upstream failure for excluded hosts; no fallback is synthesized
/// for them.
#[must_use]
pub fn bad_gateway() -> Response {
    (
        StatusCode::BAD_GATEWAY,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Upstream unreachable",
    )
        .into_response()
}
