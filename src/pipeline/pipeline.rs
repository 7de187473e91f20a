use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{info, info_span, instrument};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::pipeline::ingestion::read_raw_feed;
use crate::pipeline::processing::{clean, CleanReport, CleaningOptions};
use crate::pipeline::reporting::{run_reports, ReportOutcome};
use crate::pipeline::storage::csv_out::report_path_for;
use crate::pipeline::storage::{write_clean_report, write_cleaned_feed, LoadSummary, SupplierStore};

/// Result of a full clean → load → report run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub clean: CleanReport,
    pub load: LoadSummary,
    pub reports: Vec<ReportOutcome>,
}

/// Drives the pipeline stages with one configuration.
pub struct Pipeline {
    config: PipelineConfig,
    today: NaiveDate,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            today: Utc::now().date_naive(),
        }
    }

    /// Pin the date used as the upper bound for entry dates.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn cleaning_options(&self) -> CleaningOptions {
        CleaningOptions::from_config(&self.config.cleaning, self.today)
    }

    /// Clean `input` into `output` and write the JSON report next to it.
    #[instrument(skip(self), fields(input = %input.display(), output = %output.display()))]
    pub fn clean_file(&self, input: &Path, output: &Path) -> Result<CleanReport> {
        let raw = read_raw_feed(input)?;
        let outcome = clean(&raw, &self.cleaning_options());
        write_cleaned_feed(&outcome.table, output)?;
        write_clean_report(&outcome.report, &report_path_for(output))?;
        Ok(outcome.report)
    }

    /// Load a cleaned file into the store at `db_path`.
    #[instrument(skip(self))]
    pub fn load_file(&self, cleaned: &Path, metadata: Option<&Path>, db_path: &Path) -> Result<LoadSummary> {
        let mut store = SupplierStore::open(db_path)?;
        store.load_cleaned_file(cleaned, metadata)
    }

    /// Run every report against the store at `db_path`.
    #[instrument(skip(self))]
    pub fn report(&self, db_path: &Path, out_dir: &Path) -> Result<Vec<ReportOutcome>> {
        let store = SupplierStore::open(db_path)?;
        run_reports(store.connection(), out_dir, &self.config.reporting)
    }

    /// Clean, load and report using the configured paths.
    pub fn run_all(&self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _enter = span.enter();

        let paths = &self.config.paths;
        let cleaned = paths.cleaned_feed_path();
        let db_path = paths.database_path();

        info!("Step 1: cleaning raw feed");
        let clean = self.clean_file(&paths.raw_feed_path(), &cleaned)?;

        info!("Step 2: loading cleaned feed");
        let metadata = paths.metadata_path();
        let load = self.load_file(&cleaned, Some(&metadata), &db_path)?;

        info!("Step 3: running reports");
        let reports = self.report(&db_path, &paths.report_dir_path())?;

        info!("Pipeline run complete");
        Ok(RunSummary {
            run_id,
            clean,
            load,
            reports,
        })
    }
}
