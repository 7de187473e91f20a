// Supplier data pipeline: ingestion, cleaning, storage and reporting

pub mod ingestion;
pub mod processing;
pub mod reporting;
pub mod storage;
pub mod pipeline;

// Re-export key types and functions from each stage
pub use pipeline::{Pipeline, RunSummary};
pub use processing::clean;
