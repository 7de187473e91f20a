use chrono::NaiveDate;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use supplier_pipeline::config::PipelineConfig;
use supplier_pipeline::pipeline::storage::sqlite::MetadataSource;
use supplier_pipeline::pipeline::storage::SupplierStore;
use supplier_pipeline::pipeline::Pipeline;
use supplier_pipeline::PipelineError;

const RAW_FEED: &str = "part_id,stock_level,cost_price,entry_date\n\
P1,10,$12.50,2025-01-05\n\
P1,Low Stock,$13.00,02/10/25\n\
P2,Out of Stock,4.00,\"Feb 11, 2025\"\n\
P2,4,$5.00,2025-03-01\n\
P3,25,30,2025-03-15\n\
P3,??,$31.50,N/A\n\
P4,7,free,2025-03-20\n";

const METADATA: &str = "part_id,part_name,category\n\
P1,Brake pad,Brakes\n\
P2,Oil filter,Filters\n\
P3,Rotor,Brakes\n";

fn config_for(dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.paths.data_dir = dir.to_path_buf();
    config
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

#[test]
fn test_clean_writes_cleaned_feed_and_report() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());
    let raw = config.paths.raw_feed_path();
    let cleaned = config.paths.cleaned_feed_path();
    fs::write(&raw, RAW_FEED).unwrap();

    let pipeline = Pipeline::new(config).with_today(today());
    let report = pipeline.clean_file(&raw, &cleaned).unwrap();

    assert_eq!(report.rows_in, 7);
    assert_eq!(report.rows_out, 6);
    assert_eq!(report.dropped_cost_rows, 1);
    assert_eq!(report.dates.explicit_missing, 1);

    let output = fs::read_to_string(&cleaned).unwrap().replace("\r\n", "\n");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines[0], "part_id,stock_level,cost_price,entry_date");
    assert_eq!(lines[1], "P1,10,12.5,2025-01-05");
    // Smallest positive stock is 4
    assert_eq!(lines[2], "P1,4,13.0,2025-02-10");
    assert_eq!(lines[3], "P2,0,4.0,2025-02-11");
    // Median of [10, 4, 25, 7] is 8.5, rounded half-to-even
    assert_eq!(lines[6], "P3,8,31.5,");

    let report_json = dir.path().join("supplier_feed_cleaned.report.json");
    let parsed: serde_json::Value = serde_json::from_str(&fs::read_to_string(report_json).unwrap()).unwrap();
    assert_eq!(parsed["rows_out"], 6);
    assert_eq!(parsed["stock"]["replacement_source"], "smallest_positive");
}

#[test]
fn test_run_all_produces_store_and_reports() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());
    fs::write(config.paths.raw_feed_path(), RAW_FEED).unwrap();
    fs::write(config.paths.metadata_path(), METADATA).unwrap();
    let db_path = config.paths.database_path();
    let report_dir = config.paths.report_dir_path();

    let pipeline = Pipeline::new(config).with_today(today());
    let summary = pipeline.run_all().unwrap();

    assert_eq!(summary.load.supplier_rows, 6);
    assert_eq!(summary.load.metadata_source, MetadataSource::File);
    assert_eq!(summary.load.metadata_inserted, 3);
    assert_eq!(summary.reports.len(), 6);
    assert!(summary.reports.iter().all(|r| r.path.is_some()));

    let store = SupplierStore::open(&db_path).unwrap();
    assert_eq!(store.supplier_row_count().unwrap(), 6);

    let avg = fs::read_to_string(report_dir.join("avg_cost_by_category.csv"))
        .unwrap()
        .replace("\r\n", "\n");
    assert_eq!(avg, "category,avg_cost_price,n_rows\nBrakes,21.75,4\nFilters,4.5,2\n");

    let low = fs::read_to_string(report_dir.join("frequent_low_stock_parts.csv"))
        .unwrap()
        .replace("\r\n", "\n");
    assert_eq!(low, "part_id,low_stock_count\nP2,2\nP1,1\n");
}

#[test]
fn test_reloading_same_file_replaces_dated_rows() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());
    let raw = config.paths.raw_feed_path();
    let cleaned = config.paths.cleaned_feed_path();
    let db_path = config.paths.database_path();
    fs::write(&raw, RAW_FEED).unwrap();

    let pipeline = Pipeline::new(config).with_today(today());
    pipeline.clean_file(&raw, &cleaned).unwrap();

    let first = pipeline.load_file(&cleaned, None, &db_path).unwrap();
    assert_eq!(first.metadata_source, MetadataSource::Derived);
    assert_eq!(first.metadata_inserted, 3);
    assert!(!first.previously_loaded);

    let second = pipeline.load_file(&cleaned, None, &db_path).unwrap();
    assert!(second.previously_loaded);
    assert_eq!(second.metadata_inserted, 0);
    assert_eq!(second.file_sha256, first.file_sha256);

    // The undated row has no key to conflict on, so it is the only duplicate
    let store = SupplierStore::open(&db_path).unwrap();
    assert_eq!(store.supplier_row_count().unwrap(), 7);
}

#[test]
fn test_missing_columns_are_reported_together() {
    let dir = tempdir().unwrap();
    let config = config_for(dir.path());
    let raw = config.paths.raw_feed_path();
    fs::write(&raw, "part_id,stock\nP1,3\n").unwrap();

    let pipeline = Pipeline::new(config).with_today(today());
    let err = pipeline.clean_file(&raw, &dir.path().join("out.csv")).unwrap_err();
    match err {
        PipelineError::MissingColumns { columns, .. } => {
            assert_eq!(columns, vec!["stock_level", "cost_price", "entry_date"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_missing_input_is_an_error() {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(config_for(dir.path())).with_today(today());
    let err = pipeline
        .clean_file(&dir.path().join("nope.csv"), &dir.path().join("out.csv"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::InputNotFound(_)));
}
