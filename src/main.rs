//! Conversion dashboard - main entry point
//!
//! Serves the dashboard by default; `report` and `predict` run the same
//! aggregation and scoring from the command line.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use conversion_dashboard::analytics::conversion::{conversion_rate, print_report};
use conversion_dashboard::formatter::format_prediction;
use conversion_dashboard::prediction::{loader_for, PredictionService, QueryRecord};
use conversion_dashboard::server::{self, AppState};
use conversion_dashboard::{Config, EventTable};

#[derive(Parser)]
#[command(name = "conversion_dashboard")]
#[command(about = "Marketing conversion dashboard", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config.yml (defaults to ./config.yml, then ../config.yml)
    #[arg(long, env = "DASHBOARD_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP dashboard
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Print conversion counts and rates for a grouping column
    Report {
        /// Grouping column: marketing_channel | subscribing_channel | age_group
        #[arg(short, long, default_value = "marketing_channel")]
        grouping: String,

        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Table)]
        format: ReportFormat,
    },

    /// Score one record given as key=value pairs
    Predict {
        /// Feature values, e.g. marketing_channel=Email age_group="19-24 years"
        #[arg(required = true)]
        features: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("conversion_dashboard=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve { addr: None }) {
        Commands::Serve { addr } => {
            let state = AppState::from_config(&config)?;
            server::run(addr.unwrap_or(config.addr), Arc::new(state)).await?;
        }
        Commands::Report { grouping, format } => {
            let table = EventTable::load(&config.dataset_path)?;
            let summary = conversion_rate(&table, &grouping)?;
            match format {
                ReportFormat::Table => print_report(&summary),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }
        Commands::Predict { features } => {
            let record = QueryRecord::from_assignments(&features)?;
            let service = PredictionService::new(
                loader_for(&config.model_path, config.cache_model),
                config.decision_rule,
            );
            let prediction = service.predict(&record)?;
            let text = format_prediction(prediction.label, prediction.probability);
            println!("{}", text.prediction);
            println!("{}", text.probability);
        }
    }

    Ok(())
}
