// Pipeline storage: cleaned-file output and the SQLite store

pub mod csv_out;
pub mod sqlite;

pub use csv_out::{write_clean_report, write_cleaned_feed};
pub use sqlite::{LoadSummary, SupplierStore};
