use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing::Instrument;

mod auth;
mod config;
mod dedup;
mod error;
mod extract;
mod google;
mod header;
mod importer;
mod models;
mod report;
mod sheet;
mod status;

use crate::dedup::KeepPolicy;
use crate::extract::{Extractor, FileExtractor};
use crate::importer::{ImportOptions, Importer};
use crate::models::ImportSummary;
use crate::sheet::{CsvSheet, Worksheet};

#[derive(Parser)]
#[command(name = "grade-sheet-sync")]
#[command(about = "Append scraped assignment grades to a Google Sheet without duplicates", long_about = None)]
struct Cli {
    /// Use a local CSV file as the worksheet instead of Google Sheets
    #[arg(long, global = true)]
    sheet_csv: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make sure the worksheet carries the canonical header row
    InitSheet,
    /// Import extractor output (CSV or JSON) into the worksheet
    Import {
        #[arg(long)]
        input: PathBuf,
        /// Skip the legacy duplicate cleanup after appending
        #[arg(long)]
        skip_compact: bool,
        #[arg(long, value_enum, default_value_t = KeepPolicy::Latest)]
        keep: KeepPolicy,
    },
    /// Collapse duplicate rows already in the worksheet
    Compact {
        #[arg(long, value_enum, default_value_t = KeepPolicy::Latest)]
        keep: KeepPolicy,
    },
    /// Generate a markdown report of the worksheet
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let run_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("run", %run_id);
    async move {
        let sheet = open_sheet(cli.sheet_csv.as_deref()).await?;
        execute(cli.command, &*sheet).await
    }
    .instrument(span)
    .await
}

async fn open_sheet(sheet_csv: Option<&std::path::Path>) -> anyhow::Result<Box<dyn Worksheet>> {
    if let Some(path) = sheet_csv {
        tracing::info!(path = %path.display(), "using local CSV worksheet");
        return Ok(Box::new(CsvSheet::new(path)));
    }

    let config = config::SheetConfig::from_env()?;
    let sheet = google::GoogleSheet::open(
        &config.spreadsheet_id,
        config.worksheet.as_deref(),
        config.credentials,
    )
    .await
    .context("failed to open Google worksheet")?;
    Ok(Box::new(sheet))
}

async fn execute(command: Commands, sheet: &dyn Worksheet) -> anyhow::Result<()> {
    match command {
        Commands::InitSheet => {
            let values = sheet
                .read_all()
                .await
                .context("failed to read worksheet")?;
            header::ensure_header(sheet, values).await?;
            let keys = dedup::load_existing_keys(sheet).await?;
            println!("Header ready. {} distinct assignments on sheet.", keys.len());
        }
        Commands::Import {
            input,
            skip_compact,
            keep,
        } => {
            let options = ImportOptions {
                compact: !skip_compact,
                keep,
            };

            let mut summary = ImportSummary::default();
            let result = async {
                let records = FileExtractor::new(&input).fetch_records().await?;
                Importer::new(sheet, options)
                    .run(records, Utc::now(), &mut summary)
                    .await
            }
            .await;
            println!("{summary}");
            result?;
        }
        Commands::Compact { keep } => {
            let removed = importer::compact(sheet, keep).await?;
            println!("Removed {removed} duplicate rows.");
        }
        Commands::Report { out } => {
            let values = sheet
                .read_all()
                .await
                .context("failed to read worksheet")?;
            let generated_at = importer::format_imported_at(Utc::now());
            let report = report::build_report(&generated_at, &values);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();
}
