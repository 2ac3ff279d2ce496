//! Batch screenshot analysis and session aggregation.
//!
//! Turns the uncovered screenshots of a work session into one analysed
//! batch per invocation, and folds a session's batches into a summary.
//!
//! ```text
//! BatchSelector → AnalysisStrategy → ResponseParser → ReportPersister
//!                       ↓ (unavailable)                     ↓ (failed)
//!                 heuristic fallback                 degraded result
//! ```
//!
//! Every stage after selection is total: the caller always receives an
//! `AnalysisResult`, tagged with where it came from.

pub mod error;
pub mod types;
pub mod traits;
pub mod selector;
pub mod images;
pub mod prompt;
pub mod strategy;
pub mod parser;
pub mod score;
pub mod heuristic;
pub mod aggregator;
pub mod store;
pub mod runner;

pub use error::PipelineError;
pub use types::*;
pub use traits::*;
pub use images::{FsImageStore, ImageError};
pub use selector::BatchSelector;
pub use strategy::AnalysisStrategy;
pub use aggregator::aggregate;
pub use store::SqliteStore;
pub use runner::BatchPipeline;
