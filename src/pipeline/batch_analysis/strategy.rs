//! AnalysisStrategy: one batch in, one `AnalysisResult` out.
//!
//! Two inference modes (vision, aggregate-of-priors) share one interface;
//! the heuristic fallback takes over whenever inference is unconfigured,
//! times out, errors, or has nothing to work with. Only cancellation of the
//! owning request escapes as an error.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::error::PipelineError;
use super::heuristic::{distinct_applications, heuristic_analysis};
use super::images::load_batch_images;
use super::parser::parse_response;
use super::prompt::{build_aggregate_prompt, build_vision_prompt};
use super::traits::ImageStore;
use super::types::{AnalysisResult, AnalysisType};
use crate::models::Screenshot;
use crate::pipeline::inference::{GenerationConfig, InferenceClient, InferenceError, InferenceRequest};

/// Why a batch went to the heuristic scorer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    NotConfigured,
    NoPriorAnalyses,
    NoImages,
    Timeout,
    InferenceFailed(String),
    EmptyResponse,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotConfigured => "not_configured",
            Self::NoPriorAnalyses => "no_prior_analyses",
            Self::NoImages => "no_images",
            Self::Timeout => "timeout",
            Self::InferenceFailed(_) => "inference_failed",
            Self::EmptyResponse => "empty_response",
        }
    }
}

/// Result of the analyzing step, before parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Inference {
    /// The model answered with non-blank text.
    Response { raw: String, elapsed_ms: u64 },
    /// Inference produced nothing usable; use the heuristic.
    Unavailable(FallbackReason),
}

/// Pick the concrete mode for a batch. `Auto` prefers the cheaper
/// aggregate mode when every screenshot already has a description.
pub fn resolve_analysis_type(requested: AnalysisType, shots: &[Screenshot]) -> AnalysisType {
    match requested {
        AnalysisType::Auto => {
            let all_described = !shots.is_empty() && shots.iter().all(has_prior_analysis);
            if all_described {
                AnalysisType::Aggregate
            } else {
                AnalysisType::Vision
            }
        }
        other => other,
    }
}

fn has_prior_analysis(shot: &Screenshot) -> bool {
    shot.prior_analysis
        .as_deref()
        .is_some_and(|p| !p.trim().is_empty())
}

/// Turn the analyzing step's outcome into a result. Total.
pub fn finish_analysis(inference: &Inference, shots: &[Screenshot]) -> AnalysisResult {
    match inference {
        Inference::Response { raw, .. } => parse_response(raw, &distinct_applications(shots)),
        Inference::Unavailable(_) => heuristic_analysis(shots),
    }
}

pub struct AnalysisStrategy {
    client: Option<Arc<dyn InferenceClient>>,
    images: Arc<dyn ImageStore>,
    timeout: Duration,
    generation_config: GenerationConfig,
}

impl AnalysisStrategy {
    /// `client = None` means inference is unconfigured.
    pub fn new(
        client: Option<Arc<dyn InferenceClient>>,
        images: Arc<dyn ImageStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            images,
            timeout,
            generation_config: GenerationConfig::default(),
        }
    }

    pub fn with_generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = config;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Analyze a batch end to end. Never fails except on cancellation.
    pub async fn analyze(
        &self,
        shots: &[Screenshot],
        analysis_type: AnalysisType,
        cancel: &CancellationToken,
    ) -> Result<AnalysisResult, PipelineError> {
        let inference = self.infer(shots, analysis_type, cancel).await?;
        Ok(finish_analysis(&inference, shots))
    }

    /// The analyzing step: image retrieval plus one inference call, raced
    /// against `cancel`. `analysis_type` must already be resolved.
    pub async fn infer(
        &self,
        shots: &[Screenshot],
        analysis_type: AnalysisType,
        cancel: &CancellationToken,
    ) -> Result<Inference, PipelineError> {
        let Some(client) = self.client.as_ref() else {
            return Ok(Inference::Unavailable(FallbackReason::NotConfigured));
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PipelineError::Cancelled),
            inference = self.run(client.as_ref(), shots, analysis_type) => Ok(inference),
        }
    }

    async fn run(
        &self,
        client: &dyn InferenceClient,
        shots: &[Screenshot],
        analysis_type: AnalysisType,
    ) -> Inference {
        let request = match analysis_type {
            AnalysisType::Aggregate => {
                if !shots.iter().any(has_prior_analysis) {
                    return Inference::Unavailable(FallbackReason::NoPriorAnalyses);
                }
                InferenceRequest::text(build_aggregate_prompt(shots), self.generation_config)
            }
            // Auto is resolved by the caller; treat a stray one as vision.
            AnalysisType::Vision | AnalysisType::Auto => {
                let loaded = load_batch_images(self.images.as_ref(), shots).await;
                if loaded.is_empty() {
                    return Inference::Unavailable(FallbackReason::NoImages);
                }
                let described: Vec<&Screenshot> = loaded.iter().map(|l| l.screenshot).collect();
                let prompt = build_vision_prompt(&described);
                let images = loaded.into_iter().map(|l| l.bytes).collect();
                InferenceRequest::with_images(images, prompt, self.generation_config)
            }
        };

        tracing::debug!(
            model = client.model(),
            images = request.images.len(),
            prompt_len = request.prompt_text.len(),
            "Prompt built"
        );

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, client.generate(&request)).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => Inference::Unavailable(FallbackReason::Timeout),
            Ok(Err(InferenceError::Timeout(_))) => Inference::Unavailable(FallbackReason::Timeout),
            Ok(Err(e)) => Inference::Unavailable(FallbackReason::InferenceFailed(e.to_string())),
            Ok(Ok(raw)) if raw.trim().is_empty() => {
                Inference::Unavailable(FallbackReason::EmptyResponse)
            }
            Ok(Ok(raw)) => Inference::Response { raw, elapsed_ms },
        }
    }
}
