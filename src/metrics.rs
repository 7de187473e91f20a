//! Metric names and recording helpers for the supplier pipeline.
//!
//! Values go through the `metrics` facade. Nothing is exported unless the
//! embedding process installs a recorder, in which case every stage reports
//! under the `supplier_` prefix.

use std::fmt;

/// All metric names used in the pipeline, so call sites never carry raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Ingestion
    FeedRowsRead,

    // Cleaning
    CleanRowsIn,
    CleanRowsOut,
    CleanRowsDropped,
    CleanStockImputed,
    CleanDatesMissing,
    CleanDatesUnparseable,
    CleanDatesOutOfRange,

    // Loader
    LoadMetadataRows,
    LoadSupplierRows,
    LoadDuration,

    // Reporting
    ReportTablesWritten,
    ReportTablesSkipped,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::FeedRowsRead => "supplier_feed_rows_read_total",

            MetricName::CleanRowsIn => "supplier_clean_rows_in_total",
            MetricName::CleanRowsOut => "supplier_clean_rows_out_total",
            MetricName::CleanRowsDropped => "supplier_clean_rows_dropped_total",
            MetricName::CleanStockImputed => "supplier_clean_stock_imputed_total",
            MetricName::CleanDatesMissing => "supplier_clean_dates_missing_total",
            MetricName::CleanDatesUnparseable => "supplier_clean_dates_unparseable_total",
            MetricName::CleanDatesOutOfRange => "supplier_clean_dates_out_of_range_total",

            MetricName::LoadMetadataRows => "supplier_load_metadata_rows_total",
            MetricName::LoadSupplierRows => "supplier_load_supplier_rows_total",
            MetricName::LoadDuration => "supplier_load_duration_seconds",

            MetricName::ReportTablesWritten => "supplier_report_tables_written_total",
            MetricName::ReportTablesSkipped => "supplier_report_tables_skipped_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn increment(name: MetricName, value: u64) {
    ::metrics::counter!(name.as_str()).increment(value);
}

pub fn record_duration(name: MetricName, seconds: f64) {
    ::metrics::histogram!(name.as_str()).record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_are_prefixed() {
        for name in [
            MetricName::FeedRowsRead,
            MetricName::CleanRowsDropped,
            MetricName::LoadDuration,
            MetricName::ReportTablesSkipped,
        ] {
            assert!(name.to_string().starts_with("supplier_"));
        }
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        increment(MetricName::CleanRowsIn, 3);
        record_duration(MetricName::LoadDuration, 0.25);
    }
}
