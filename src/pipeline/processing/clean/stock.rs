use serde::Serialize;

/// Marker vocabularies, stored trimmed and lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSets {
    pub out_of_stock: Vec<String>,
    pub low_stock: Vec<String>,
}

impl MarkerSets {
    pub fn new<S: AsRef<str>>(out_of_stock: &[S], low_stock: &[S]) -> Self {
        let normalize = |items: &[S]| -> Vec<String> {
            items.iter().map(|s| s.as_ref().trim().to_lowercase()).collect()
        };
        Self {
            out_of_stock: normalize(out_of_stock),
            low_stock: normalize(low_stock),
        }
    }
}

impl Default for MarkerSets {
    fn default() -> Self {
        Self::new(
            &crate::constants::OUT_OF_STOCK_MARKERS,
            &crate::constants::LOW_STOCK_MARKERS,
        )
    }
}

/// What a raw stock-level value turned out to be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StockClass {
    Numeric(f64),
    OutOfStock,
    LowStock,
    Missing,
}

/// Where the low-stock replacement value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementSource {
    SmallestPositive,
    ColumnMedian,
    Zero,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockStats {
    /// Median of the numeric values, `None` when the column had none.
    pub median: Option<f64>,
    pub low_stock_replacement: f64,
    pub replacement_source: ReplacementSource,
    pub numeric: usize,
    pub out_of_stock: usize,
    pub low_stock: usize,
    /// Missing or unrecognized values filled with the median.
    pub imputed: usize,
    /// Values that rounded below zero and were clamped.
    pub clamped: usize,
}

#[derive(Debug, Clone)]
pub struct StockOutcome {
    pub levels: Vec<i64>,
    pub stats: StockStats,
}

/// Exclusive upper bound for a numeric stock level; anything at or above it
/// would saturate when rounded into an `i64`.
const STOCK_LEVEL_CEILING: f64 = i64::MAX as f64;

/// Classify one raw value. Markers take priority over numeric parsing.
pub fn classify_stock(raw: &str, markers: &MarkerSets) -> StockClass {
    let key = raw.trim().to_lowercase();

    if markers.out_of_stock.iter().any(|m| *m == key) {
        return StockClass::OutOfStock;
    }
    if markers.low_stock.iter().any(|m| *m == key) {
        return StockClass::LowStock;
    }
    match key.parse::<f64>() {
        Ok(v) if v.is_finite() && v < STOCK_LEVEL_CEILING => StockClass::Numeric(v),
        _ => StockClass::Missing,
    }
}

/// Median of `values`; the mean of the middle pair for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Normalize a whole stock-level column to non-negative integers.
///
/// Column statistics (median and low-stock replacement) are taken over the
/// numeric values only; out-of-stock markers do not contribute to them.
/// Rounding is half-to-even.
pub fn normalize_stock<S: AsRef<str>>(values: &[S], markers: &MarkerSets) -> StockOutcome {
    let classes: Vec<StockClass> = values
        .iter()
        .map(|v| classify_stock(v.as_ref(), markers))
        .collect();

    let numeric: Vec<f64> = classes
        .iter()
        .filter_map(|c| match c {
            StockClass::Numeric(v) => Some(*v),
            _ => None,
        })
        .collect();

    let median = median(&numeric);

    let smallest_positive = numeric
        .iter()
        .copied()
        .filter(|v| *v > 0.0)
        .min_by(|a, b| a.total_cmp(b));

    let (low_stock_replacement, replacement_source) = match (smallest_positive, median) {
        (Some(v), _) => (v, ReplacementSource::SmallestPositive),
        (None, Some(m)) => (m, ReplacementSource::ColumnMedian),
        (None, None) => (0.0, ReplacementSource::Zero),
    };
    let fill = median.unwrap_or(0.0);

    let mut stats = StockStats {
        median,
        low_stock_replacement,
        replacement_source,
        numeric: numeric.len(),
        out_of_stock: 0,
        low_stock: 0,
        imputed: 0,
        clamped: 0,
    };

    let levels = classes
        .iter()
        .map(|class| {
            let value = match class {
                StockClass::Numeric(v) => *v,
                StockClass::OutOfStock => {
                    stats.out_of_stock += 1;
                    0.0
                }
                StockClass::LowStock => {
                    stats.low_stock += 1;
                    low_stock_replacement
                }
                StockClass::Missing => {
                    stats.imputed += 1;
                    fill
                }
            };
            let rounded = value.round_ties_even() as i64;
            if rounded < 0 {
                stats.clamped += 1;
                0
            } else {
                rounded
            }
        })
        .collect();

    StockOutcome { levels, stats }
}
