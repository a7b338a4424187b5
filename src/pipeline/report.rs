use crate::data::TradeRecord;
use crate::pipeline::engine::RunOutput;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const RECORDS_FILE: &str = "records.csv";
pub const BASELINES_FILE: &str = "baselines.csv";
pub const ANOMALIES_FILE: &str = "anomalies.csv";
pub const DISCREPANCIES_FILE: &str = "discrepancies.csv";
pub const BY_REPORTER_FILE: &str = "discrepancy_by_reporter.csv";
pub const BY_YEAR_FILE: &str = "discrepancy_by_year.csv";
pub const BREAKS_FILE: &str = "breaks.csv";
pub const REPORT_FILE: &str = "report.json";

/// Write flat rows with a header taken from the field names
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Export canonical records only
pub fn write_records(dir: &Path, records: &[TradeRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(RECORDS_FILE);
    write_csv(&path, records)?;
    info!("Wrote {} canonical records to {}", records.len(), path.display());
    Ok(path)
}

/// Export every table as CSV plus the full run as one JSON document.
///
/// Returns the paths written, in a stable order.
pub fn export(dir: &Path, output: &RunOutput) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut written = vec![write_records(dir, &output.records)?];
    write_table(dir, BASELINES_FILE, &output.anomalies.baselines, &mut written)?;
    write_table(dir, ANOMALIES_FILE, &output.anomalies.ranked, &mut written)?;
    write_table(dir, DISCREPANCIES_FILE, &output.discrepancies, &mut written)?;
    write_table(dir, BY_REPORTER_FILE, &output.discrepancy_by_reporter, &mut written)?;
    write_table(dir, BY_YEAR_FILE, &output.discrepancy_by_year, &mut written)?;
    if let Some(breaks) = &output.breaks {
        write_table(dir, BREAKS_FILE, &breaks.results, &mut written)?;
    }

    let json_path = dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(output)?;
    fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;
    written.push(json_path);

    info!("Exported {} file(s) to {}", written.len(), dir.display());
    Ok(written)
}

fn write_table<T: Serialize>(dir: &Path, name: &str, rows: &[T], written: &mut Vec<PathBuf>) -> Result<()> {
    let path = dir.join(name);
    write_csv(&path, rows)?;
    written.push(path);
    Ok(())
}

impl RunOutput {
    /// Print results summary
    pub fn print_summary(&self) {
        let diag = &self.diagnostics;
        println!("\n╔════════════════════════════════════════════════╗");
        println!("║         TRADE ANOMALY REPORT SUMMARY           ║");
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Canonical Records: {:<28} ║", self.records.len());
        println!("║ Files Read: {:<35} ║", diag.files.len());
        println!("║ Files Failed: {:<33} ║", diag.file_failures.len());
        println!("║ Unmapped Labels: {:<30} ║", diag.unmapped_labels.len());
        println!("║ Missing-Rate Exclusions: {:<22} ║", diag.missing_rate_total());
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Evaluation Year: {:<30} ║", self.anomalies.eval_year);
        println!("║ Partners Scored: {:<30} ║", self.anomalies.ranked.len());
        println!("║ Partners Flagged: {:<29} ║", self.anomalies.flagged_count());
        println!("║ Partners Undefined: {:<27} ║", self.anomalies.undefined.len());
        for result in self.anomalies.flagged().take(5) {
            let line = format!("{} {:+.1}% z={:.2}", result.partner, result.growth_pct, result.z_score);
            println!("║   {:<44} ║", line);
        }
        println!("╠════════════════════════════════════════════════╣");
        println!("║ Discrepancy Records: {:<26} ║", self.discrepancies.len());
        println!("║ Significant Discrepancies: {:<20} ║", self.significant_discrepancies);
        if let Some(breaks) = &self.breaks {
            let significant = breaks.results.iter().filter(|r| r.significant).count();
            println!("╠════════════════════════════════════════════════╣");
            println!("║ Break Tests: {:<34} ║", breaks.results.len());
            println!("║ Significant Breaks: {:<27} ║", significant);
        }
        println!("╚════════════════════════════════════════════════╝\n");
    }
}
