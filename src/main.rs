use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use forecast::{
    commands::{export_ledger, forecast as forecast_command, forecast_all},
    config::ForecastOverrides,
    context::{AppContext, LedgerSource},
};
use log::info;
use std::env;
use std::path::PathBuf;

const DEFAULT_LEDGER_FILE: &str = "../data/ledger.bin";

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Realized PnL trajectory and forward forecast bands for trading models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone, Debug)]
struct ForecastArgs {
    /// Only use trades closed on or after this date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    since: Option<NaiveDate>,
    /// Multiplier applied to every trade's net profit
    #[arg(long)]
    scale_factor: Option<f64>,
    /// Number of most recent trades used for the spread coefficients
    #[arg(long)]
    recent_window: Option<usize>,
    /// Forecast horizon in days
    #[arg(long)]
    horizon_days: Option<f64>,
    /// Read trades from a ledger snapshot instead of the database
    #[arg(long = "ledger-file", value_name = "PATH")]
    ledger_file: Option<PathBuf>,
}

impl ForecastArgs {
    fn overrides(&self) -> ForecastOverrides {
        ForecastOverrides {
            since: self.since,
            scale_factor: self.scale_factor,
            recent_window: self.recent_window,
            horizon_days: self.horizon_days,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the actual + forecast trajectory for one model
    Forecast {
        /// Model identifier (substring match)
        model: String,
        #[command(flatten)]
        args: ForecastArgs,
        /// Destination JSON file (defaults to ./forecast-<model>.json)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
        /// Store the trajectory in the database as well
        #[arg(long)]
        persist: bool,
    },
    /// Build trajectories for every model in the ledger
    ForecastAll {
        #[command(flatten)]
        args: ForecastArgs,
        /// Directory receiving one JSON file per model
        #[arg(long = "output-dir", value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,
    },
    /// Export the ledger to a snapshot file for offline forecasts
    ExportLedger {
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
        /// Restrict the snapshot to models containing this pattern
        #[arg(long, default_value = "")]
        model: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Cli { command } = cli;

    let database_url = env::var("DATABASE_URL").ok();
    if database_url.is_none() && command_requires_database(&command) {
        return Err(anyhow!(
            "DATABASE_URL must be set for this command. For offline runs, pass --ledger-file."
        ));
    }
    let app_context = AppContext::initialize(database_url).await?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting forecast. Projections are descriptive statistics, not trading advice.");

    match command {
        Commands::Forecast {
            model,
            args,
            output,
            persist,
        } => {
            let request = forecast_command::ForecastRequest {
                model_pattern: model,
                source: LedgerSource::from_cli(args.ledger_file.clone()),
                output,
                persist,
                overrides: args.overrides(),
            };
            forecast_command::run(&app_context, &request).await?;
        }
        Commands::ForecastAll { args, output_dir } => {
            let request = forecast_all::ForecastAllRequest {
                source: LedgerSource::from_cli(args.ledger_file.clone()),
                output_dir,
                overrides: args.overrides(),
            };
            forecast_all::run(&app_context, &request).await?;
        }
        Commands::ExportLedger { output, model } => {
            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_LEDGER_FILE));
            export_ledger::run(&app_context, &model, &output_path).await?;
        }
    }

    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("expected a date in YYYY-MM-DD format (value: {})", raw))
}

fn command_requires_database(command: &Commands) -> bool {
    match command {
        Commands::Forecast { args, persist, .. } => args.ledger_file.is_none() || *persist,
        Commands::ForecastAll { args, .. } => args.ledger_file.is_none(),
        Commands::ExportLedger { .. } => true,
    }
}
