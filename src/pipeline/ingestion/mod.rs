// Pipeline ingestion: reading raw supplier feeds from disk

pub mod feed_reader;

pub use feed_reader::{read_raw_feed, read_raw_from_reader};
