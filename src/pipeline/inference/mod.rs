//! The opaque inference call: prompt text plus optional images in, free
//! text out. Everything model-specific stays behind `InferenceClient`.

pub mod types;
pub mod ollama;

pub use types::*;
pub use ollama::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference timed out after {0}s")]
    Timeout(u64),

    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Inference service returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}
