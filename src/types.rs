use chrono::NaiveDate;
use serde::Serialize;

use crate::constants::REQUIRED_COLUMNS;
use crate::error::{PipelineError, Result};

/// Header layout of a supplier feed: where the required columns sit and which
/// columns are carried through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    headers: Vec<String>,
    part_id: usize,
    stock_level: usize,
    cost_price: usize,
    entry_date: usize,
}

impl ColumnLayout {
    /// Resolve the required columns in `headers`.
    ///
    /// Fails with [`PipelineError::MissingColumns`] naming every absent column,
    /// so a broken feed is reported in one go rather than one column at a time.
    pub fn from_headers(headers: Vec<String>, source_name: &str) -> Result<Self> {
        let positions: Vec<Option<usize>> = REQUIRED_COLUMNS
            .iter()
            .map(|name| headers.iter().position(|h| h == name))
            .collect();

        match positions.as_slice() {
            [Some(part_id), Some(stock_level), Some(cost_price), Some(entry_date)] => Ok(Self {
                part_id: *part_id,
                stock_level: *stock_level,
                cost_price: *cost_price,
                entry_date: *entry_date,
                headers,
            }),
            _ => Err(PipelineError::MissingColumns {
                source_name: source_name.to_string(),
                columns: REQUIRED_COLUMNS
                    .iter()
                    .zip(&positions)
                    .filter(|(_, pos)| pos.is_none())
                    .map(|(name, _)| name.to_string())
                    .collect(),
            }),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn is_required(&self, index: usize) -> bool {
        index == self.part_id
            || index == self.stock_level
            || index == self.cost_price
            || index == self.entry_date
    }

    /// Names of the passthrough columns, in header order.
    pub fn passthrough_headers(&self) -> Vec<&str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.is_required(*i))
            .map(|(_, h)| h.as_str())
            .collect()
    }

    /// Split one row of fields into a [`RawRecord`]. Short rows are padded with
    /// empty strings.
    pub fn split_row<S: AsRef<str>>(&self, fields: &[S]) -> RawRecord {
        let field = |i: usize| fields.get(i).map(|f| f.as_ref().to_string()).unwrap_or_default();

        let passthrough = (0..self.headers.len())
            .filter(|i| !self.is_required(*i))
            .map(field)
            .collect();

        RawRecord {
            part_id: field(self.part_id),
            stock_level: field(self.stock_level),
            cost_price: field(self.cost_price),
            entry_date: field(self.entry_date),
            passthrough,
        }
    }

    /// Reassemble a cleaned record into fields ordered like the headers.
    pub fn join_row(&self, record: &CleanedRecord) -> Vec<String> {
        let mut passthrough = record.passthrough.iter();
        (0..self.headers.len())
            .map(|i| {
                if i == self.part_id {
                    record.part_id.clone()
                } else if i == self.stock_level {
                    record.stock_level.to_string()
                } else if i == self.cost_price {
                    format_decimal(record.cost_price)
                } else if i == self.entry_date {
                    record
                        .entry_date
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default()
                } else {
                    passthrough.next().cloned().unwrap_or_default()
                }
            })
            .collect()
    }
}

/// One untyped row of the supplier feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub part_id: String,
    pub stock_level: String,
    pub cost_price: String,
    pub entry_date: String,
    pub passthrough: Vec<String>,
}

/// The raw feed as read from disk.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub layout: ColumnLayout,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A row conforming to the cleaned schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanedRecord {
    pub part_id: String,
    /// Always >= 0.
    pub stock_level: i64,
    /// Always finite and > 0.
    pub cost_price: f64,
    /// Within the accepted date window, or absent.
    pub entry_date: Option<NaiveDate>,
    pub passthrough: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub layout: ColumnLayout,
    pub records: Vec<CleanedRecord>,
}

impl CleanedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Render a price as decimal text that always carries a fractional part,
/// e.g. `20.0` rather than `20`.
pub fn format_decimal(value: f64) -> String {
    let text = value.to_string();
    if text.contains(['.', 'e', 'E']) || !value.is_finite() {
        text
    } else {
        format!("{text}.0")
    }
}
