pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::db::DatabaseError;
use crate::pipeline::batch_analysis::{AnalysisStrategy, BatchPipeline, FsImageStore, SqliteStore};
use crate::pipeline::inference::{InferenceClient, InferenceError, OllamaClient};

/// Failures that stop the service from starting.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Inference client error: {0}")]
    Inference(#[from] InferenceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Wire the pipeline from settings: SQLite store, filesystem images and,
/// when a URL is configured, the Ollama client.
pub fn build_pipeline(settings: &Settings) -> Result<BatchPipeline, StartupError> {
    let conn = db::open_database(&settings.db_path)?;
    let store = Arc::new(SqliteStore::new(conn));

    let client: Option<Arc<dyn InferenceClient>> = match &settings.inference_url {
        Some(url) => Some(Arc::new(OllamaClient::new(
            url,
            &settings.inference_model,
            settings.inference_timeout,
        )?)),
        None => {
            tracing::warn!("WORKTRACE_INFERENCE_URL not set, all batches will use heuristic analysis");
            None
        }
    };

    let strategy = AnalysisStrategy::new(
        client,
        Arc::new(FsImageStore::new(settings.image_root.clone())),
        settings.inference_timeout,
    );

    Ok(
        BatchPipeline::new(store.clone(), store.clone(), store, strategy)
            .with_defaults(settings.default_batch_size, settings.default_analysis_type),
    )
}

/// Run the HTTP service until the process is stopped.
pub async fn run(settings: Settings) -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let pipeline = build_pipeline(&settings)?;
    let ctx = api::ApiContext::new(Arc::new(pipeline), settings.inference_url.is_some());
    let app = api::api_router(ctx);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(
        addr = %settings.bind_addr,
        db = %settings.db_path.display(),
        model = %settings.inference_model,
        "Listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
