use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::metrics::{self, MetricName};
use crate::types::{ColumnLayout, RawTable};

/// Read a raw supplier feed from `path`.
///
/// A missing file and a header without the required columns are both fatal.
pub fn read_raw_feed(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(PipelineError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let table = read_raw_from_reader(file, &path.display().to_string())?;
    info!("Loaded raw supplier feed {} ({} rows)", path.display(), table.len());
    Ok(table)
}

/// Read a raw feed from any reader. `source_name` is only used in errors.
pub fn read_raw_from_reader<R: Read>(reader: R, source_name: &str) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    debug!(?headers, "Feed header");

    let layout = ColumnLayout::from_headers(headers, source_name)?;

    let mut records = Vec::new();
    for row in csv_reader.records() {
        let row = row?;
        let fields: Vec<&str> = row.iter().collect();
        if fields.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        records.push(layout.split_row(&fields));
    }

    metrics::increment(MetricName::FeedRowsRead, records.len() as u64);
    Ok(RawTable { layout, records })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_rows_and_passthrough() {
        let data = "\u{feff}part_id,stock_level,cost_price,entry_date,part_name\n\
                    P1,5,$1.00,2025-01-01,Bolt\n\
                    P2,Low,\"$2,50\",\"Apr 12, 2025\",Nut\n";
        let table = read_raw_from_reader(data.as_bytes(), "inline").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[1].entry_date, "Apr 12, 2025");
        assert_eq!(table.records[1].passthrough, vec!["Nut"]);
        assert_eq!(table.layout.passthrough_headers(), vec!["part_name"]);
    }

    #[test]
    fn test_blank_lines_skipped_and_short_rows_padded() {
        let data = "part_id,stock_level,cost_price,entry_date\nP1,3\n,,,\nP2,4,1.0,2024-02-02\n";
        let table = read_raw_from_reader(data.as_bytes(), "inline").unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records[0].cost_price, "");
    }

    #[test]
    fn test_missing_columns_fatal() {
        let data = "part_id,stock_level\nP1,3\n";
        let err = read_raw_from_reader(data.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumns { .. }));
    }

    #[test]
    fn test_missing_file_fatal() {
        let err = read_raw_feed(Path::new("/no/such/feed.csv")).unwrap_err();
        assert!(matches!(err, PipelineError::InputNotFound(_)));
    }
}
