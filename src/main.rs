//! LTV Forecast CLI
//!
//! Forecasts lifetime value per country or campaign from cohort data files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ltv_forecast::{build_runtime, run_pipeline, Config, Grouping, Model};

#[derive(Parser)]
#[command(name = "ltv-forecast")]
#[command(about = "Forecast user lifetime value from 7-day cohort data", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cohort data file (.csv or .json)
    #[arg(short, long, global = true)]
    source: Option<PathBuf>,

    /// Aggregation key: country or campaign
    #[arg(short, long, global = true)]
    aggregate: Option<Grouping>,

    /// Forecast model: linear or average
    #[arg(short, long, global = true)]
    model: Option<Model>,

    /// Day to forecast
    #[arg(long, global = true)]
    target_day: Option<f64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the forecast pipeline (default if no command specified)
    Run,

    /// Validate configuration
    Validate,

    /// Generate a sample configuration file
    GenerateConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only forecast lines
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        None | Some(Commands::Run) => {
            let config = load_config(&cli)?;
            run_command(config)?;
        }

        Some(Commands::Validate) => {
            let config = load_config(&cli)?;
            validate_command(config)?;
        }

        Some(Commands::GenerateConfig { output }) => {
            generate_config_command(output)?;
        }
    }

    Ok(())
}

/// Load the config file if one was given, then apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    if let Some(source) = &cli.source {
        config.source = Some(source.clone());
    }
    if let Some(aggregate) = cli.aggregate {
        config.aggregate = aggregate;
    }
    if let Some(model) = cli.model {
        config.forecast.model = model;
    }
    if let Some(day) = cli.target_day {
        config.forecast.target_day = day;
    }

    Ok(config)
}

fn run_command(config: Config) -> Result<()> {
    config.validate()?;

    let runtime = build_runtime(config.runtime.worker_threads)?;
    runtime.block_on(async { run_pipeline(config, |line| println!("{}", line)).await })?;

    Ok(())
}

fn validate_command(config: Config) -> Result<()> {
    config.validate()?;
    config.build_pipeline()?;
    println!("Configuration is valid");
    Ok(())
}

fn generate_config_command(output: &PathBuf) -> Result<()> {
    // Generate a commented YAML config
    let yaml = r#"# LTV Forecast Pipeline Configuration

# Cohort data file. The decoder is chosen by extension:
#   .csv   userId,campaignId,country,ltv1..ltv7 (header row required)
#   .json  [{"CampaignId", "Country", "Ltv1".."Ltv7", "Users"}], LTV divided by Users
source: "data/cohorts.csv"

# Aggregation key: country | campaign
aggregate: country

# Output line format: plain ("JP: 1.23") | bracketed ("<c1>: 1.23")
# Follows the aggregate when omitted (country -> plain, campaign -> bracketed)
# formatter: plain

forecast:
  # linear (least-squares line) | average (mean per-day delta)
  model: linear

  # Day to forecast
  target_day: 60

  # Keys with too few observed days for the model:
  #   fail  abort the run with an error
  #   hold  use the last observed average
  degenerate: fail

# Inter-stage queue capacities
queues:
  records: 64
  aggregated: 64
  predictions: 16
  lines: 16
  # Per-key worker inbound queue (at least 2)
  worker: 2
  # Shared worker result queue
  worker_results: 5

runtime:
  # Tokio async worker threads (null = num CPUs)
  worker_threads: null

  # Save the run summary as JSON
  # summary_output_path: "summary.json"
"#;

    std::fs::write(output, yaml)?;
    println!("Generated sample configuration at: {}", output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_default() {
        // No subcommand - should default to Run
        let cli = Cli::try_parse_from(["ltv-forecast"]);
        assert!(cli.is_ok());
        assert!(cli.unwrap().command.is_none());
    }

    #[test]
    fn test_cli_parse_overrides() {
        let cli = Cli::try_parse_from([
            "ltv-forecast",
            "--source",
            "data.json",
            "--aggregate",
            "campaign",
            "--model",
            "average",
            "--target-day",
            "30",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.source, Some(PathBuf::from("data.json")));
        assert_eq!(config.aggregate, Grouping::Campaign);
        assert_eq!(config.forecast.model, Model::Average);
        assert_eq!(config.forecast.target_day, 30.0);
    }

    #[test]
    fn test_cli_rejects_unknown_model() {
        let cli = Cli::try_parse_from(["ltv-forecast", "--model", "quadratic"]);
        assert!(cli.is_err());
    }

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::try_parse_from(["ltv-forecast", "validate", "-c", "test.json"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_generated_config_parses() {
        let dir = PathBuf::from("target/test-ltv-cli");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.yaml");
        generate_config_command(&path).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.aggregate, Grouping::Country);
        assert_eq!(config.forecast.target_day, 60.0);
        assert!(config.validate().is_ok());
    }
}
