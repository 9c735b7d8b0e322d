//! SheetSync Convert - run parse + transform on a local file

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;
use sheetsync_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use sheetsync_ingest::{tabular, TabularFormat, TransformEngine};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sheetsync-convert")]
#[command(author, version, about = "Convert a spreadsheet into the records SheetSync would publish")]
struct Cli {
    /// CSV, TSV, spreadsheet workbook, or a JSON array of row objects
    #[arg(required_unless_present = "list_categories")]
    file: Option<PathBuf>,

    /// Category whose rules are applied
    #[arg(short, long, default_value = "")]
    category: String,

    /// Only print the first N records
    #[arg(short, long)]
    limit: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the categories with registered rules and exit
    #[arg(long)]
    list_categories: bool,

    /// Verbose output (logs go to stderr)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Warn
    };
    // stdout carries the JSON
    let log_config = LogConfig::builder()
        .level(log_level)
        .output(LogOutput::Console)
        .console_stderr(true)
        .log_file_prefix("sheetsync-convert")
        .build()
        .merge_env()?;
    let _guard = init_logging(&log_config)?;

    let engine = TransformEngine::builtin();

    if cli.list_categories {
        for category in engine.registry().categories() {
            println!("{category}");
        }
        return Ok(());
    }

    let Some(path) = cli.file else {
        bail!("No input file given");
    };

    let mut records = convert(&engine, &path, &cli.category)?;
    info!(file = %path.display(), category = %cli.category, records = records.len(), "Converted file");

    if let Some(limit) = cli.limit {
        records.truncate(limit);
    }

    let output = Value::Array(records.into_iter().map(Value::Object).collect());
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}

fn convert(
    engine: &TransformEngine,
    path: &std::path::Path,
    category: &str,
) -> Result<Vec<sheetsync_ingest::Row>> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let rows: Vec<Value> = serde_json::from_slice(&bytes)
            .with_context(|| format!("{} is not a JSON array", path.display()))?;
        return Ok(engine.transform_values(rows, category)?);
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let format = TabularFormat::from_file_name(name);
    let rows = tabular::parse_path(path)
        .with_context(|| format!("Failed to parse {} as {}", path.display(), format))?;
    Ok(engine.transform(rows, category))
}
