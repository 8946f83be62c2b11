#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the catalog refresh tool.

use std::path::PathBuf;
use std::sync::Arc;

use catalog_refresh_cli_utils::IndicatifProgress;
use catalog_refresh_database::memory::MemoryDatabase;
use catalog_refresh_database::schema::{create_table_sql, validate_identifier};
use catalog_refresh_database::Connector;
use catalog_refresh_database::db::MySqlConnector;
use catalog_refresh_database_models::SwapStrategy;
use catalog_refresh_ingest::{AppConfig, RefreshPipeline};
use catalog_refresh_ingest_models::{DedupMode, PipelineState, RunReport};
use catalog_refresh_source::http::HttpCatalogSource;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalog_refresh_ingest", about = "Catalog table refresh tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the whole catalog and swap it into the live table
    Refresh {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Live table to replace (overrides config)
        #[arg(long)]
        live_table: Option<String>,
        /// Maximum concurrent fetch tasks (overrides config)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Promotion strategy: `atomic` or `drop-then-rename`
        #[arg(long)]
        swap: Option<SwapStrategy>,
        /// Deduplication mode: `check-then-append` or `atomic`
        #[arg(long)]
        dedup: Option<DedupMode>,
        /// Load into an in-memory store instead of MySQL
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the effective configuration
    ShowConfig {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the `CREATE TABLE` statement for the catalog layout
    Ddl {
        /// Table name to use in the statement
        #[arg(long, default_value = "book")]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = catalog_refresh_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Refresh {
            config,
            live_table,
            concurrency,
            swap,
            dedup,
            dry_run,
        } => {
            let mut config = AppConfig::load(config.as_deref())?;
            if let Some(live_table) = live_table {
                config.refresh.live_table = live_table;
            }
            if let Some(concurrency) = concurrency {
                config.refresh.concurrency = concurrency;
            }
            if let Some(swap) = swap {
                config.refresh.swap = swap;
            }
            if let Some(dedup) = dedup {
                config.refresh.dedup = dedup;
            }
            config.validate()?;

            let source = Arc::new(HttpCatalogSource::new(config.source.clone())?);
            let progress = IndicatifProgress::tasks_bar(&multi, "Fetching catalog");
            let pipeline = RefreshPipeline::new(config.refresh.clone(), source).with_progress(progress);

            let memory = dry_run.then(MemoryDatabase::new);
            let mysql = MySqlConnector::new(config.database.clone());
            let store: &dyn Connector = match &memory {
                Some(memory) => {
                    log::info!("Dry run: loading into an in-memory store");
                    memory
                }
                None => &mysql,
            };

            let report = pipeline.run(store).await?;
            print_report(&report);

            if let Some(memory) = memory {
                println!(
                    "Dry run: {} rows in {}",
                    memory.row_count(&report.live_table).unwrap_or(0),
                    report.live_table
                );
            }

            if report.state == PipelineState::Failed {
                return Err(report
                    .failure
                    .unwrap_or_else(|| "refresh failed".to_string())
                    .into());
            }
        }
        Commands::ShowConfig { config } => {
            let config = AppConfig::load(config.as_deref())?;
            print!("{}", config.redacted().to_toml()?);
        }
        Commands::Ddl { table } => {
            validate_identifier(&table)?;
            println!("{};", create_table_sql(&table));
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("State:             {}", report.state);
    println!("Live table:        {}", report.live_table);
    println!("Staging table:     {}", report.staging_table);
    println!(
        "Fetch tasks:       {} ({} pages, {} exhausted, {} failed, {} capped)",
        report.fetch.tasks,
        report.fetch.fetch_calls,
        report.fetch.exhausted,
        report.fetch.failed,
        report.fetch.page_limited,
    );
    println!(
        "Records:           {} received, {} kept",
        report.fetch.records_received, report.fetch.records_recorded
    );
    println!(
        "Loaded:            {} books, {} magazines in {} statements",
        report.books_loaded, report.magazines_loaded, report.insert_statements
    );
    println!("Duration:          {:.1}s", report.duration.as_secs_f64());
    if let Some(failure) = &report.failure {
        println!("Failure:           {failure}");
    }
}
