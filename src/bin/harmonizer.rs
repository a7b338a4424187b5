use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tradewatch::pipeline::{report, SourceInput};
use tradewatch::utils::init_from_config;
use tradewatch::{Config, Pipeline};

/// Parse every configured source and export the canonical records
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (falls back to CONFIG_FILE, then config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides general.output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_from_config(&config.logging)?;

    println!("╔════════════════════════════════════════════════╗");
    println!("║         TRADE DATA HARMONIZER                  ║");
    println!("╚════════════════════════════════════════════════╝");
    println!();

    let pipeline = Pipeline::from_config(&config)?;
    let inputs: Vec<SourceInput> = config.sources.iter().map(SourceInput::from).collect();
    info!("✓ Configuration loaded: {} source(s)", inputs.len());

    let ingested = pipeline.ingest(&inputs)?;
    let diag = &ingested.diagnostics;
    for failure in &diag.file_failures {
        warn!("Skipped {} ({}): {}", failure.file, failure.source, failure.error);
    }

    let output_dir = args
        .output
        .unwrap_or_else(|| PathBuf::from(&config.general.output_dir));
    let path = report::write_records(&output_dir, &ingested.records)?;

    println!("Canonical records: {}", ingested.records.len());
    println!("Files read:        {}", diag.files.len());
    println!("Files failed:      {}", diag.file_failures.len());
    println!("Unmapped labels:   {}", diag.unmapped_labels.len());
    println!("Missing rates:     {}", diag.missing_rate_total());
    println!();
    println!("Wrote {}", path.display());

    Ok(())
}
