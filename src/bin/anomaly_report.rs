use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tradewatch::pipeline::{report, AnalysisSettings, SourceInput};
use tradewatch::utils::init_from_config;
use tradewatch::{Config, Pipeline};

/// Harmonize every source, score growth anomalies and compare mirror statistics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (falls back to CONFIG_FILE, then config/default.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides general.output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Evaluation year (overrides analysis.eval_year)
    #[arg(short, long)]
    eval_year: Option<i32>,

    /// Number of ranked partners to print
    #[arg(long, default_value = "15")]
    top: usize,

    /// Print the summary without writing any files
    #[arg(long)]
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(year) = args.eval_year {
        config.analysis.eval_year = year;
    }
    init_from_config(&config.logging)?;

    let pipeline = Pipeline::from_config(&config)?;
    let settings = AnalysisSettings::from_config(&config, &pipeline.countries())?;
    let inputs: Vec<SourceInput> = config.sources.iter().map(SourceInput::from).collect();
    info!("✓ Configuration loaded, evaluating {}", config.analysis.eval_year);

    let output = pipeline.run(&inputs, &settings)?;
    output.print_summary();

    println!(
        "{:<4} {:<28} {:>10} {:>8} {:>10} {:>16}  FLAG",
        "#", "PARTNER", "GROWTH %", "Z", "P", "VOLUME EUR"
    );
    for (rank, result) in output.anomalies.ranked.iter().take(args.top).enumerate() {
        println!(
            "{:<4} {:<28} {:>10.1} {:>8.2} {:>10.4} {:>16.0}  {}",
            rank + 1,
            result.partner,
            result.growth_pct,
            result.z_score,
            result.p_value,
            result.volume_eur,
            if result.flagged { "*" } else { "" }
        );
    }
    println!();

    if !args.dry_run {
        let output_dir = args
            .output
            .unwrap_or_else(|| PathBuf::from(&config.general.output_dir));
        for path in report::export(&output_dir, &output)? {
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}
