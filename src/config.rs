use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::clean::entry_date::SlashDateOrder;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub cleaning: CleaningConfig,
    pub reporting: ReportingConfig,
}

/// File locations. Relative file names are resolved against `data_dir`;
/// absolute ones are used as given.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub raw_feed: PathBuf,
    pub cleaned_feed: PathBuf,
    pub metadata: PathBuf,
    pub database: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            raw_feed: PathBuf::from(DEFAULT_RAW_FEED),
            cleaned_feed: PathBuf::from(DEFAULT_CLEANED_FEED),
            metadata: PathBuf::from(DEFAULT_METADATA_FILE),
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
        }
    }
}

impl PathsConfig {
    pub fn raw_feed_path(&self) -> PathBuf {
        self.data_dir.join(&self.raw_feed)
    }

    pub fn cleaned_feed_path(&self) -> PathBuf {
        self.data_dir.join(&self.cleaned_feed)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir.join(&self.metadata)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database)
    }

    pub fn report_dir_path(&self) -> PathBuf {
        self.data_dir.join(&self.report_dir)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    pub out_of_stock_markers: Vec<String>,
    pub low_stock_markers: Vec<String>,
    pub missing_date_tokens: Vec<String>,
    pub min_date: NaiveDate,
    /// How `a/b/yyyy` dates are read by the primary parse.
    pub slash_date_order: SlashDateOrder,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        let (y, m, d) = MIN_ENTRY_DATE;
        Self {
            out_of_stock_markers: OUT_OF_STOCK_MARKERS.iter().map(|s| s.to_string()).collect(),
            low_stock_markers: LOW_STOCK_MARKERS.iter().map(|s| s.to_string()).collect(),
            missing_date_tokens: MISSING_DATE_TOKENS.iter().map(|s| s.to_string()).collect(),
            min_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN),
            slash_date_order: SlashDateOrder::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Rows with `stock_level` strictly below this count as low stock.
    pub low_stock_threshold: i64,
    pub top_stock_limit: usize,
    pub low_stock_parts_limit: usize,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            top_stock_limit: DEFAULT_TOP_STOCK_LIMIT,
            low_stock_parts_limit: DEFAULT_LOW_STOCK_PARTS_LIMIT,
        }
    }
}

impl PipelineConfig {
    /// Load configuration.
    ///
    /// An explicitly requested file must exist. Without one, the default file
    /// is used when present and built-in defaults otherwise. Environment
    /// overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.paths.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Ok(db) = env::var(ENV_DATABASE_PATH) {
            if !db.trim().is_empty() {
                self.paths.database = PathBuf::from(db.trim());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.reporting.top_stock_limit == 0 || self.reporting.low_stock_parts_limit == 0 {
            return Err(PipelineError::Config("report limits must be at least 1".to_string()));
        }
        let overlap: Vec<&String> = self
            .cleaning
            .low_stock_markers
            .iter()
            .filter(|m| {
                self.cleaning
                    .out_of_stock_markers
                    .iter()
                    .any(|o| o.trim().eq_ignore_ascii_case(m.trim()))
            })
            .collect();
        if !overlap.is_empty() {
            return Err(PipelineError::Config(format!(
                "markers listed as both out-of-stock and low-stock: {:?}",
                overlap
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_feed_conventions() {
        let config = PipelineConfig::default();
        assert_eq!(config.cleaning.min_date, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert!(config.cleaning.out_of_stock_markers.contains(&"oos".to_string()));
        assert_eq!(config.reporting.low_stock_threshold, 6);
        assert_eq!(config.paths.raw_feed_path(), PathBuf::from("data/supplier_feed.csv"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [paths]
            data_dir = "/srv/feeds"
            database = "/var/lib/inventory.db"

            [cleaning]
            slash_date_order = "day_first"

            [reporting]
            low_stock_threshold = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.paths.raw_feed_path(), PathBuf::from("/srv/feeds/supplier_feed.csv"));
        assert_eq!(config.paths.database_path(), PathBuf::from("/var/lib/inventory.db"));
        assert_eq!(config.cleaning.slash_date_order, SlashDateOrder::DayFirst);
        assert_eq!(config.reporting.low_stock_threshold, 10);
        assert_eq!(config.reporting.top_stock_limit, 5);
    }

    #[test]
    fn test_overlapping_markers_rejected() {
        let result = PipelineConfig::from_toml_str(
            r#"
            [cleaning]
            out_of_stock_markers = ["oos", "low"]
            "#,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = PipelineConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }
}
