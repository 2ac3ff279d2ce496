//! Caller identity from the `x-user-id` header.
//!
//! No authentication happens here; the header is trusted as set by the
//! gateway. Requests without it are rejected before reaching a handler.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Require `x-user-id` and inject `UserContext`.
pub async fn require_user(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let user_id = req
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    match user_id {
        Some(user_id) => {
            req.extensions_mut().insert(UserContext { user_id });
            next.run(req).await
        }
        None => ApiError::Unauthorized.into_response(),
    }
}
