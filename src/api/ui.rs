//! UI serving routes
//!
//! Serves the embedded check-in page; everything else static comes from the
//! configured static directory via the router's fallback service.

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../ui/index.html");

/// GET /
///
/// Serves the check-in page
pub async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
