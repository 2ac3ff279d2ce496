//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;

/// Build the API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(ctx: ApiContext) -> Router {
    let sessions = Router::new()
        .route("/sessions/:id/batches", post(endpoints::batches::trigger))
        .route("/sessions/:id/summary", get(endpoints::summary::get))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::user::require_user));

    let open = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", sessions)
        .nest("/api", open)
        .layer(TraceLayer::new_for_http())
}
