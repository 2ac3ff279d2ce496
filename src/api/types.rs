//! Shared types for the API layer.

use std::sync::Arc;

use crate::pipeline::batch_analysis::BatchPipeline;

/// Shared state for all routes.
#[derive(Clone)]
pub struct ApiContext {
    pub pipeline: Arc<BatchPipeline>,
    pub inference_configured: bool,
}

impl ApiContext {
    pub fn new(pipeline: Arc<BatchPipeline>, inference_configured: bool) -> Self {
        Self {
            pipeline,
            inference_configured,
        }
    }
}

/// Caller identity, injected into request extensions by the user
/// middleware. Set by the gateway in front of this service.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: String,
}
