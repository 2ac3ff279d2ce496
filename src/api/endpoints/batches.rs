//! `POST /api/sessions/:id/batches`: analyse the next batch of a session.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Extension;
use axum::Json;
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::pipeline::batch_analysis::{BatchProcessingResult, BatchRequest};

/// The body is optional; an empty body uses the configured defaults. A
/// body that is present but does not decode is rejected with 400.
///
/// The pipeline runs on its own task. If the client goes away the handler
/// is dropped, the token fires and inference stops, while a write that has
/// already started still completes.
pub async fn trigger(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<BatchProcessingResult>, ApiError> {
    let request = parse_request(&body)?;

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let pipeline = ctx.pipeline.clone();
    let task = tokio::spawn(async move {
        pipeline
            .trigger_batch_processing(&user.user_id, &session_id, &request, &cancel)
            .await
    });

    let result = task
        .await
        .map_err(|e| ApiError::Internal(format!("batch task failed: {e}")))??;
    Ok(Json(result))
}

fn parse_request(body: &[u8]) -> Result<BatchRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BatchRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}
