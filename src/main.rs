//! `weather-etl`: runs the hourly weather pipeline stages from the command line.

use anyhow::Context;
use argh::FromArgs;
use weather_etl::{extract, load, report, transform, PipelineConfig};

/// Batch ETL for hourly city weather observations
#[derive(FromArgs, Debug)]
struct Args {
    /// path to a YAML config file (default: built-in settings)
    #[argh(option, short = 'c')]
    config: Option<String>,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs, Debug)]
#[argh(subcommand)]
enum Command {
    Extract(ExtractArgs),
    Transform(TransformArgs),
    Load(LoadArgs),
    Report(ReportArgs),
    Run(RunArgs),
}

/// fetch raw payloads for every configured location
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "extract")]
struct ExtractArgs {}

/// normalize raw payloads into per-file and cumulative CSV
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "transform")]
struct TransformArgs {}

/// replace the store table with the cumulative dataset
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "load")]
struct LoadArgs {}

/// render per-city charts for a recent window
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "report")]
struct ReportArgs {
    /// window in days (default: report_window_days from the config)
    #[argh(option, short = 'd')]
    days: Option<u32>,
}

/// run extract, transform, load and report in order
#[derive(FromArgs, Debug)]
#[argh(subcommand, name = "run")]
struct RunArgs {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    let args: Args = argh::from_env();
    let config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid configuration")?;

    match args.command {
        Command::Extract(_) => run_extract(&config).await,
        Command::Transform(_) => run_transform(&config),
        Command::Load(_) => run_load(&config),
        Command::Report(ReportArgs { days }) => {
            run_report(&config, days.unwrap_or(config.report_window_days))
        }
        Command::Run(_) => {
            run_extract(&config).await?;
            run_transform(&config)?;
            run_load(&config)?;
            run_report(&config, config.report_window_days)
        }
    }
}

async fn run_extract(config: &PipelineConfig) -> anyhow::Result<()> {
    let report = extract(config).await.context("extract stage failed")?;
    if !report.is_clean() {
        log::warn!(
            "Extract had failures for: {}",
            report.failed_ids().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

fn run_transform(config: &PipelineConfig) -> anyhow::Result<()> {
    let summary = transform(config).context("transform stage failed")?;
    if !summary.report.is_clean() {
        log::warn!(
            "Transform had failures for: {}",
            summary.report.failed_ids().collect::<Vec<_>>().join(", ")
        );
    }
    Ok(())
}

fn run_load(config: &PipelineConfig) -> anyhow::Result<()> {
    let summary = load(config).context("load stage failed")?;
    log::info!(
        "Table '{}' now holds {} rows ({} columns)",
        summary.table,
        summary.rows,
        summary.columns.len()
    );
    Ok(())
}

fn run_report(config: &PipelineConfig, days: u32) -> anyhow::Result<()> {
    let charts = report(config, days).context("report stage failed")?;
    for chart in &charts {
        log::info!("  - {} ({} points)", chart.path.display(), chart.points);
    }
    Ok(())
}
