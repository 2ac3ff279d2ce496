pub mod inference;
pub mod batch_analysis;
