//! Cleaning engine for supplier feeds.
//!
//! `clean` turns a [`RawTable`] into a [`CleanedTable`] in three stages:
//!
//! 1. stock levels are normalized over the *whole* raw table, so the median and
//!    low-stock replacement always come from the pre-drop column;
//! 2. cost prices are parsed and rows without a usable price are dropped;
//! 3. entry dates of the surviving rows are parsed and range-checked, and the
//!    date audit is tallied over those rows.
//!
//! The input is never mutated and the same input and options always produce
//! the same output.

pub mod cost;
pub mod entry_date;
pub mod stock;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::CleaningConfig;
use crate::metrics::{self, MetricName};
use crate::types::{CleanedRecord, CleanedTable, RawTable};

pub use cost::parse_cost;
pub use entry_date::{normalize_entry_date, DateAudit, DateParsePolicy, DateResolution, SlashDateOrder};
pub use stock::{classify_stock, normalize_stock, MarkerSets, ReplacementSource, StockClass, StockStats};

/// Everything `clean` needs besides the table itself.
#[derive(Debug, Clone, PartialEq)]
pub struct CleaningOptions {
    pub markers: MarkerSets,
    pub date_policy: DateParsePolicy,
}

impl CleaningOptions {
    /// Options with the built-in vocabularies and `[2000-01-01, today]` window.
    pub fn new(today: NaiveDate) -> Self {
        Self::from_config(&CleaningConfig::default(), today)
    }

    pub fn from_config(config: &CleaningConfig, today: NaiveDate) -> Self {
        let mut date_policy = DateParsePolicy::new(config.min_date, today);
        date_policy.missing_tokens = config
            .missing_date_tokens
            .iter()
            .map(|t| t.trim().to_lowercase())
            .collect();
        date_policy.slash_order = config.slash_date_order;

        Self {
            markers: MarkerSets::new(&config.out_of_stock_markers, &config.low_stock_markers),
            date_policy,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.date_policy.max_date
    }
}

impl Default for CleaningOptions {
    fn default() -> Self {
        Self::new(Utc::now().date_naive())
    }
}

/// Structured summary of one cleaning run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanReport {
    pub rows_in: usize,
    pub rows_out: usize,
    pub dropped_cost_rows: usize,
    pub stock: StockStats,
    pub dates: DateAudit,
}

#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: CleanedTable,
    pub report: CleanReport,
}

/// Clean a raw supplier table.
pub fn clean(raw: &RawTable, options: &CleaningOptions) -> CleanOutcome {
    let stock_values: Vec<&str> = raw.records.iter().map(|r| r.stock_level.as_str()).collect();
    let stock = normalize_stock(&stock_values, &options.markers);
    debug!(
        median = ?stock.stats.median,
        replacement = stock.stats.low_stock_replacement,
        source = ?stock.stats.replacement_source,
        "Stock levels normalized"
    );

    let mut dates = DateAudit::default();
    let mut dropped_cost_rows = 0;
    let mut records = Vec::with_capacity(raw.len());

    for (record, stock_level) in raw.records.iter().zip(stock.levels.iter().copied()) {
        let Some(cost_price) = parse_cost(&record.cost_price) else {
            dropped_cost_rows += 1;
            debug!(part_id = %record.part_id, cost_price = %record.cost_price, "Dropping row without usable cost price");
            continue;
        };

        let resolution = normalize_entry_date(&record.entry_date, &options.date_policy);
        dates.record(&resolution);

        records.push(CleanedRecord {
            part_id: record.part_id.clone(),
            stock_level,
            cost_price,
            entry_date: resolution.date(),
            passthrough: record.passthrough.clone(),
        });
    }

    let report = CleanReport {
        rows_in: raw.len(),
        rows_out: records.len(),
        dropped_cost_rows,
        stock: stock.stats,
        dates,
    };
    log_report(&report);

    CleanOutcome {
        table: CleanedTable {
            layout: raw.layout.clone(),
            records,
        },
        report,
    }
}

fn log_report(report: &CleanReport) {
    info!(
        rows_in = report.rows_in,
        rows_out = report.rows_out,
        dropped_cost_rows = report.dropped_cost_rows,
        "Cleaning complete"
    );
    info!(
        rows = report.dates.total_rows,
        explicit_missing = report.dates.explicit_missing,
        unparseable = report.dates.unparseable,
        out_of_range = report.dates.out_of_range,
        "Entry date audit"
    );
    if report.dropped_cost_rows > 0 {
        warn!("{} rows dropped for missing or invalid cost_price", report.dropped_cost_rows);
    }

    metrics::increment(MetricName::CleanRowsIn, report.rows_in as u64);
    metrics::increment(MetricName::CleanRowsOut, report.rows_out as u64);
    metrics::increment(MetricName::CleanRowsDropped, report.dropped_cost_rows as u64);
    metrics::increment(MetricName::CleanStockImputed, report.stock.imputed as u64);
    metrics::increment(MetricName::CleanDatesMissing, report.dates.explicit_missing as u64);
    metrics::increment(MetricName::CleanDatesUnparseable, report.dates.unparseable as u64);
    metrics::increment(MetricName::CleanDatesOutOfRange, report.dates.out_of_range as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnLayout;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(rows: &[[&str; 5]]) -> RawTable {
        let layout = ColumnLayout::from_headers(
            ["part_id", "stock_level", "cost_price", "entry_date", "supplier"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            "test",
        )
        .unwrap();
        let records = rows.iter().map(|r| layout.split_row(r)).collect();
        RawTable { layout, records }
    }

    fn options() -> CleaningOptions {
        CleaningOptions::new(ymd(2025, 10, 1))
    }

    #[test]
    fn test_clean_applies_all_stages() {
        let raw = table(&[
            ["P1", "5", "$19.99", "2025-04-12", "Acme"],
            ["P2", "12", "3.10", "Apr 12, 2025", "Acme"],
            ["P3", "Low Stock", "7", "13/40/99", "Bolt"],
            ["P4", "3", "garbage", "2025-01-01", "Bolt"],
            ["P5", "Out of Stock", "1.5", "1999-01-01", "Cog"],
            ["P6", "", "2", "n/a", "Cog"],
        ]);
        let outcome = clean(&raw, &options());
        let rows = &outcome.table.records;

        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.part_id != "P4"));

        assert_eq!(rows[0].cost_price, 19.99);
        assert_eq!(rows[0].entry_date, Some(ymd(2025, 4, 12)));
        assert_eq!(rows[1].entry_date, Some(ymd(2025, 4, 12)));
        // P4 was dropped, but its stock of 3 still drives the replacement
        assert_eq!(rows[2].stock_level, 3);
        assert_eq!(rows[2].entry_date, None);
        assert_eq!(rows[3].stock_level, 0);
        assert_eq!(rows[3].entry_date, None);
        // median of [5, 12, 3]
        assert_eq!(rows[4].stock_level, 5);
        assert_eq!(rows[4].passthrough, vec!["Cog"]);

        let report = &outcome.report;
        assert_eq!(report.rows_in, 6);
        assert_eq!(report.rows_out, 5);
        assert_eq!(report.dropped_cost_rows, 1);
        assert_eq!(
            report.dates,
            DateAudit {
                total_rows: 5,
                explicit_missing: 1,
                unparseable: 1,
                out_of_range: 1,
                valid: 2,
            }
        );
    }

    #[test]
    fn test_clean_leaves_input_untouched() {
        let raw = table(&[["P1", "low", "$2", "2024-01-01", "x"]]);
        let before = raw.records.clone();
        let _ = clean(&raw, &options());
        assert_eq!(raw.records, before);
    }

    #[test]
    fn test_empty_table() {
        let outcome = clean(&table(&[]), &options());
        assert!(outcome.table.is_empty());
        assert_eq!(outcome.report.dates.total_rows, 0);
        assert_eq!(outcome.report.stock.replacement_source, ReplacementSource::Zero);
    }

    #[test]
    fn test_options_from_config_normalizes_tokens() {
        let mut config = CleaningConfig::default();
        config.out_of_stock_markers = vec!["  SOLD OUT ".to_string()];
        config.missing_date_tokens = vec!["TBD".to_string()];
        let opts = CleaningOptions::from_config(&config, ymd(2025, 1, 1));

        assert_eq!(classify_stock("sold out", &opts.markers), StockClass::OutOfStock);
        assert_eq!(
            normalize_entry_date("tbd", &opts.date_policy),
            DateResolution::MissingToken
        );
        assert_eq!(opts.today(), ymd(2025, 1, 1));
    }
}
