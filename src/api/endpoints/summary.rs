//! `GET /api/sessions/:id/summary`: recompute and return the session summary.

use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::pipeline::batch_analysis::SessionSummaryResponse;

pub async fn get(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummaryResponse>, ApiError> {
    let summary = ctx
        .pipeline
        .generate_session_summary(&user.user_id, &session_id)
        .await?;
    Ok(Json(summary))
}
