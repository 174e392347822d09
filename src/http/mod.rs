//! HTTP request routing.
//!
//! | Path | Handler |
//! |------|---------|
//! | `/ws` | WebSocket upgrade into a relay session |
//! | anything else | Bundled web UI |

// ============================================================================
// Submodules
// ============================================================================

/// Bundled web UI.
pub mod assets;

/// WebSocket upgrade handler.
pub mod upgrade;

// ============================================================================
// Imports
// ============================================================================

use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, HeaderValue};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::acceptor::SessionAcceptor;

pub use upgrade::WS_PATH;

// ============================================================================
// Router
// ============================================================================

/// Builds the application router.
///
/// Handlers expect a `ConnectInfo<SocketAddr>` extension, so serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn router(acceptor: SessionAcceptor) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    Router::new()
        .route(WS_PATH, get(upgrade::ws_handler))
        .fallback(assets::handler)
        .layer(trace_layer)
        .with_state(acceptor)
}

/// Plain-text response with the given status.
pub(crate) fn text_response(status: StatusCode, body: &'static str) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

// ============================================================================
// Tests
// ============================================================================
