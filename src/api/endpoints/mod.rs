//! Endpoint handlers, one module per resource.

pub mod batches;
pub mod health;
pub mod summary;
