use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

use supplier_pipeline::config::PipelineConfig;
use supplier_pipeline::logging;
use supplier_pipeline::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "supplier_pipeline")]
#[command(about = "Clean, load and report on supplier inventory feeds")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a raw supplier feed into the typed output schema
    Clean {
        /// Raw feed (defaults to the configured raw feed)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Cleaned output file (defaults to the configured cleaned feed)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Upper bound for entry dates, YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Load a cleaned feed into the SQLite store
    Load {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Product metadata CSV (part_id, part_name, category)
        #[arg(long)]
        metadata: Option<PathBuf>,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Run the fixed reports against the store
    Report {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Run clean, load and report with the configured paths
    Run {
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    // Dropped on return, which flushes the file log
    let _log_guard = logging::init_logging("logs");

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PipelineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    let paths = config.paths.clone();

    match cli.command {
        Commands::Clean { input, output, today } => {
            let mut pipeline = Pipeline::new(config);
            if let Some(today) = today {
                pipeline = pipeline.with_today(today);
            }
            let input = input.unwrap_or_else(|| paths.raw_feed_path());
            let output = output.unwrap_or_else(|| paths.cleaned_feed_path());
            let report = pipeline
                .clean_file(&input, &output)
                .with_context(|| format!("cleaning {}", input.display()))?;

            println!("\n📊 Cleaning results:");
            println!("   Rows in: {}", report.rows_in);
            println!("   Rows out: {}", report.rows_out);
            println!("   Dropped (cost_price): {}", report.dropped_cost_rows);
            println!("\n=== ENTRY_DATE Audit ===");
            println!("   Rows: {}", report.dates.total_rows);
            println!("   Explicit missing tokens: {}", report.dates.explicit_missing);
            println!("   Unparseable: {}", report.dates.unparseable);
            println!("   Out-of-range: {}", report.dates.out_of_range);
            println!("✅ Saved cleaned data -> {}", output.display());
        }
        Commands::Load { input, metadata, db } => {
            let pipeline = Pipeline::new(config);
            let input = input.unwrap_or_else(|| paths.cleaned_feed_path());
            let metadata = metadata.unwrap_or_else(|| paths.metadata_path());
            let db = db.unwrap_or_else(|| paths.database_path());
            let summary = pipeline
                .load_file(&input, Some(&metadata), &db)
                .with_context(|| format!("loading {}", input.display()))?;
            println!(
                "✅ Load complete: {} supplier rows, {} new metadata rows (run {})",
                summary.supplier_rows, summary.metadata_inserted, summary.run_id
            );
        }
        Commands::Report { db, out_dir } => {
            let pipeline = Pipeline::new(config);
            let db = db.unwrap_or_else(|| paths.database_path());
            let out_dir = out_dir.unwrap_or_else(|| paths.report_dir_path());
            let outcomes = pipeline.report(&db, &out_dir).context("running reports")?;
            for outcome in &outcomes {
                match &outcome.path {
                    Some(path) => println!("   {} -> {} ({} rows)", outcome.name, path.display(), outcome.rows),
                    None => println!("   {} skipped (no data)", outcome.name),
                }
            }
            println!("✅ Analysis complete. See CSVs in: {}", out_dir.display());
        }
        Commands::Run { today } => {
            let mut pipeline = Pipeline::new(config);
            if let Some(today) = today {
                pipeline = pipeline.with_today(today);
            }
            let summary = pipeline.run_all().context("running full pipeline")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            println!("✅ Full pipeline completed successfully!");
        }
    }
    Ok(())
}
