//! Fixed aggregate reports over the loaded store.
//!
//! Each query result is saved as `<out_dir>/<name>.csv`. A query that returns no
//! rows is skipped with a warning rather than failing the run.

use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::config::ReportingConfig;
use crate::error::Result;
use crate::metrics::{self, MetricName};
use crate::types::format_decimal;

/// Which configured row limit a query's `?2` is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLimit {
    Unlimited,
    TopStock,
    LowStockParts,
}

/// A named report query. `?1` in the SQL is bound to the low-stock threshold
/// and `?2` to the row limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    pub name: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
    pub limit: ReportLimit,
}

pub const AVG_COST_BY_CATEGORY: ReportQuery = ReportQuery {
    name: "avg_cost_by_category",
    description: "Average cost price by category",
    sql: "SELECT COALESCE(NULLIF(pm.category, ''), 'uncategorized') AS category,
                 ROUND(AVG(sd.cost_price), 2) AS avg_cost_price,
                 COUNT(sd.cost_price) AS n_rows
          FROM supplier_data sd
          JOIN product_metadata pm ON pm.part_id = sd.part_id
          GROUP BY 1
          ORDER BY avg_cost_price DESC",
    limit: ReportLimit::Unlimited,
};

pub const TOP_CURRENT_STOCK: ReportQuery = ReportQuery {
    name: "top_current_stock",
    description: "Parts with the highest stock at their latest entry",
    sql: "WITH latest AS (
              SELECT part_id, MAX(entry_date) AS latest_date
              FROM supplier_data
              GROUP BY part_id
          )
          SELECT sd.part_id, pm.part_name AS product_name, sd.stock_level, sd.entry_date
          FROM supplier_data sd
          JOIN latest l ON sd.part_id = l.part_id AND sd.entry_date = l.latest_date
          LEFT JOIN product_metadata pm ON pm.part_id = sd.part_id
          ORDER BY sd.stock_level DESC, sd.part_id
          LIMIT ?2",
    limit: ReportLimit::TopStock,
};

pub const MONTHLY_ENTRIES: ReportQuery = ReportQuery {
    name: "monthly_entries",
    description: "Supplier entries per month",
    sql: "SELECT SUBSTR(entry_date, 1, 7) AS month, COUNT(*) AS entries
          FROM supplier_data
          WHERE entry_date IS NOT NULL
          GROUP BY month
          ORDER BY month",
    limit: ReportLimit::Unlimited,
};

pub const MONTHLY_NEW_PARTS: ReportQuery = ReportQuery {
    name: "monthly_new_parts",
    description: "Parts first seen per month",
    sql: "WITH first_seen AS (
              SELECT part_id, MIN(entry_date) AS first_entry
              FROM supplier_data
              WHERE entry_date IS NOT NULL
              GROUP BY part_id
          )
          SELECT SUBSTR(first_entry, 1, 7) AS month, COUNT(*) AS new_parts
          FROM first_seen
          GROUP BY month
          ORDER BY month",
    limit: ReportLimit::Unlimited,
};

pub const FREQUENT_LOW_STOCK_PARTS: ReportQuery = ReportQuery {
    name: "frequent_low_stock_parts",
    description: "Parts most often reported below the low-stock threshold",
    sql: "SELECT part_id, COUNT(*) AS low_stock_count
          FROM supplier_data
          WHERE stock_level < ?1
          GROUP BY part_id
          ORDER BY low_stock_count DESC, part_id
          LIMIT ?2",
    limit: ReportLimit::LowStockParts,
};

pub const MONTHLY_LOW_STOCK_TREND: ReportQuery = ReportQuery {
    name: "monthly_low_stock_trend",
    description: "Low-stock rows per month",
    sql: "SELECT SUBSTR(entry_date, 1, 7) AS month, COUNT(*) AS low_stock_count
          FROM supplier_data
          WHERE stock_level < ?1 AND entry_date IS NOT NULL
          GROUP BY month
          ORDER BY month",
    limit: ReportLimit::Unlimited,
};

/// Tabular result of one query, every cell rendered as text.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub name: String,
    pub rows: usize,
    /// `None` when the query returned nothing and the table was skipped.
    pub path: Option<PathBuf>,
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => format_decimal(f),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => hex::encode(b),
    }
}

/// Run one report query and collect its rows.
pub fn run_query(conn: &Connection, query: &ReportQuery, config: &ReportingConfig) -> Result<ReportTable> {
    let mut stmt = conn.prepare(query.sql)?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let limit = match query.limit {
        ReportLimit::Unlimited => -1,
        ReportLimit::TopStock => config.top_stock_limit as i64,
        ReportLimit::LowStockParts => config.low_stock_parts_limit as i64,
    };
    // Bind only as many parameters as the statement declares
    let bound: [&dyn rusqlite::ToSql; 2] = [&config.low_stock_threshold, &limit];
    let count = stmt.parameter_count();

    let mut rows = stmt.query(&bound[..count])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(columns.len());
        for i in 0..columns.len() {
            cells.push(render_value(row.get_ref(i)?));
        }
        out.push(cells);
    }
    Ok(ReportTable { columns, rows: out })
}

fn save_table(table: &ReportTable, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// All reports, in the order they are produced.
pub fn standard_reports() -> [ReportQuery; 6] {
    [
        AVG_COST_BY_CATEGORY,
        TOP_CURRENT_STOCK,
        MONTHLY_ENTRIES,
        MONTHLY_NEW_PARTS,
        FREQUENT_LOW_STOCK_PARTS,
        MONTHLY_LOW_STOCK_TREND,
    ]
}

/// Run every standard report and save the non-empty ones under `out_dir`.
#[instrument(skip(conn, config), fields(out_dir = %out_dir.display()))]
pub fn run_reports(conn: &Connection, out_dir: &Path, config: &ReportingConfig) -> Result<Vec<ReportOutcome>> {
    fs::create_dir_all(out_dir)?;
    let mut outcomes = Vec::new();

    for query in standard_reports() {
        let table = run_query(conn, &query, config)?;
        let path = out_dir.join(format!("{}.csv", query.name));
        if table.rows.is_empty() {
            warn!("No data for {} ({}), skipping", query.name, query.description);
            if path.exists() {
                fs::remove_file(&path)?;
                info!("Removed stale table: {}", path.display());
            }
            metrics::increment(MetricName::ReportTablesSkipped, 1);
            outcomes.push(ReportOutcome {
                name: query.name.to_string(),
                rows: 0,
                path: None,
            });
            continue;
        }

        save_table(&table, &path)?;
        info!("Saved table: {} ({} rows)", path.display(), table.rows.len());
        metrics::increment(MetricName::ReportTablesWritten, 1);
        outcomes.push(ReportOutcome {
            name: query.name.to_string(),
            rows: table.rows.len(),
            path: Some(path),
        });
    }

    Ok(outcomes)
}
