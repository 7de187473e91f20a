/// Column names every supplier feed must carry.
/// Anything else in the header row is passed through untouched.
pub const PART_ID_COL: &str = "part_id";
pub const STOCK_LEVEL_COL: &str = "stock_level";
pub const COST_PRICE_COL: &str = "cost_price";
pub const ENTRY_DATE_COL: &str = "entry_date";

pub const REQUIRED_COLUMNS: [&str; 4] = [PART_ID_COL, STOCK_LEVEL_COL, COST_PRICE_COL, ENTRY_DATE_COL];

// Optional product metadata columns
pub const PART_NAME_COL: &str = "part_name";
pub const CATEGORY_COL: &str = "category";

// Stock-level markers (matched after trim + lowercase)
pub const OUT_OF_STOCK_MARKERS: [&str; 3] = ["out of stock", "unavailable", "oos"];
pub const LOW_STOCK_MARKERS: [&str; 3] = ["low stock", "low", "ls"];

/// Tokens that mean "no date was supplied", as opposed to a malformed date.
pub const MISSING_DATE_TOKENS: [&str; 7] = ["", "n/a", "na", "none", "missing", "null", "undefined"];

/// Earliest entry date accepted as plausible.
pub const MIN_ENTRY_DATE: (i32, u32, u32) = (2000, 1, 1);

// Reporting defaults
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 6;
pub const DEFAULT_TOP_STOCK_LIMIT: usize = 5;
pub const DEFAULT_LOW_STOCK_PARTS_LIMIT: usize = 10;

// Default locations, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "supplier_pipeline.toml";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_RAW_FEED: &str = "supplier_feed.csv";
pub const DEFAULT_CLEANED_FEED: &str = "supplier_feed_cleaned.csv";
pub const DEFAULT_METADATA_FILE: &str = "product_metadata.csv";
pub const DEFAULT_DATABASE_FILE: &str = "supplier_pipeline.db";
pub const DEFAULT_REPORT_DIR: &str = "analysis_outputs";

// Environment overrides
pub const ENV_DATABASE_PATH: &str = "SUPPLIER_PIPELINE_DB";
pub const ENV_DATA_DIR: &str = "SUPPLIER_PIPELINE_DATA_DIR";
