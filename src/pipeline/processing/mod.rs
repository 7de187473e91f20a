// Pipeline processing: cleaning and normalization of supplier feeds

pub mod clean;

pub use clean::{clean, CleanOutcome, CleanReport, CleaningOptions};
