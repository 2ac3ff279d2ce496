//! HTTP surface over the batch pipeline.
//!
//! Routes are nested under `/api/`. Session routes require the
//! `x-user-id` header; `/api/health` does not.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
